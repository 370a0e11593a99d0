//! Property-based tests for the archive codec.

use huffpack::archive::{read_all, ArchiveWriter};
use huffpack::{compress, decompress, ArchiveError, FrequencyTable, HuffmanTree};
use proptest::prelude::*;

/// Inputs drawn from a small alphabet, so that weights repeat and ties occur.
fn small_alphabet_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(b"abcde \n".to_vec()), 0..2000)
}

fn any_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4000)
}

fn entry_name() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(/[a-z0-9 ._-]{1,12}){0,2}"
}

proptest! {
    #[test]
    fn prop_roundtrip(data in any_bytes(), name in entry_name()) {
        let archive = compress(&data, &name).unwrap();
        let (decoded, decoded_name) = decompress(&archive).unwrap();
        prop_assert_eq!(decoded, data);
        prop_assert_eq!(decoded_name, name);
    }

    #[test]
    fn prop_roundtrip_with_ties(data in small_alphabet_bytes()) {
        let archive = compress(&data, "ties.txt").unwrap();
        prop_assert_eq!(decompress(&archive).unwrap().0, data);
    }

    #[test]
    fn prop_single_repeated_byte(byte in any::<u8>(), len in 1usize..5000) {
        let data = vec![byte; len];
        let archive = compress(&data, "repeat").unwrap();
        let freq = FrequencyTable::from_bytes(&data);
        let alphabet = HuffmanTree::build(&freq).unwrap().alphabet();
        prop_assert_eq!(alphabet.get(byte).unwrap().len(), 0);
        prop_assert_eq!(decompress(&archive).unwrap().0, data);
    }

    #[test]
    fn prop_tree_construction_is_deterministic(counts in prop::collection::vec(0u64..1000, 256)) {
        let mut weights = [0u64; 256];
        weights.copy_from_slice(&counts);
        let freq = FrequencyTable::from_counts(weights).unwrap();
        let first = HuffmanTree::build(&freq).map(|tree| tree.alphabet());
        let second = HuffmanTree::build(&freq).map(|tree| tree.alphabet());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_codes_are_prefix_free(data in any_bytes()) {
        let freq = FrequencyTable::from_bytes(&data);
        if let Some(tree) = HuffmanTree::build(&freq) {
            let codes: Vec<String> = tree.alphabet().iter().map(|(_, code)| code.to_string()).collect();
            if codes.len() > 1 {
                for (i, a) in codes.iter().enumerate() {
                    for (j, b) in codes.iter().enumerate() {
                        prop_assert!(i == j || !b.starts_with(a.as_str()));
                    }
                }
            }
        }
    }

    #[test]
    fn prop_only_present_symbols_are_coded(data in small_alphabet_bytes()) {
        let freq = FrequencyTable::from_bytes(&data);
        let coded: Vec<u8> = HuffmanTree::build(&freq)
            .map(|tree| tree.alphabet().iter().map(|(symbol, _)| symbol).collect())
            .unwrap_or_default();
        let present: Vec<u8> = freq.present().map(|(symbol, _)| symbol).collect();
        prop_assert_eq!(coded, present);
    }

    #[test]
    fn prop_body_length_matches_weights(data in any_bytes()) {
        let mut writer = ArchiveWriter::new(Vec::new());
        let stats = writer.add_bytes("body", &data).unwrap();
        let freq = FrequencyTable::from_bytes(&data);
        let bits = HuffmanTree::build(&freq)
            .map_or(0, |tree| tree.alphabet().encoded_bits(&freq));
        prop_assert_eq!(stats.encoded_bits as u128, bits);
        prop_assert_eq!(stats.body_len as u128, bits.div_ceil(8));
        prop_assert_eq!(writer.finish().unwrap().len() as u64, stats.archived_len());
    }

    #[test]
    fn prop_truncated_body_is_rejected(data in prop::collection::vec(any::<u8>(), 2..2000)) {
        let mut archive = compress(&data, "cut").unwrap();
        let freq = FrequencyTable::from_bytes(&data);
        prop_assume!(freq.distinct() > 1);
        archive.pop();
        let is_premature_end = matches!(decompress(&archive), Err(ArchiveError::PrematureEnd { .. }));
        prop_assert!(is_premature_end);
    }

    #[test]
    fn prop_multi_entry_framing(entries in prop::collection::vec((entry_name(), any_bytes()), 1..6)) {
        let mut writer = ArchiveWriter::new(Vec::new());
        for (name, data) in &entries {
            writer.add_bytes(name, data).unwrap();
        }
        let archive = writer.finish().unwrap();
        let read = read_all(&archive).unwrap();
        prop_assert_eq!(read.len(), entries.len());
        for (entry, (name, data)) in read.iter().zip(&entries) {
            prop_assert_eq!(&entry.name, name);
            prop_assert_eq!(&entry.data, data);
        }
    }
}
