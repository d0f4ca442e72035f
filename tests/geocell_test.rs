//! Geocell Codec Integration Tests
//!
//! Seed-based checks of the topic builder and decoder:
//! - Topic shape (segment count, digit range, prefix handling)
//! - Decoded token length and bit layout
//! - Cell containment between levels
//! - Rejection of malformed topics

use geomq_loadgen::geocell::{
    build_topic, decode_topic, digits, prefix_depth, CodecError, MAX_LEVELS,
};
use geomq_loadgen::rng::DeterministicRng;

const SEEDS: u64 = 500;

fn expected_token_len(level: usize) -> usize {
    (1 + (level - 1).div_ceil(2)).min(16)
}

// ============================================================================
// Topic Building
// ============================================================================

#[test]
fn test_topic_shape_many_seeds() {
    for seed in 0..SEEDS {
        let mut rng = DeterministicRng::new(seed);
        let value = rng.next_u64();
        let level = rng.gen_range(1, MAX_LEVELS as u64 + 1) as usize;

        let topic = build_topic("", value, level);
        let segments: Vec<&str> = topic.split('/').skip(1).collect();
        assert_eq!(segments.len(), level, "seed {} topic {}", seed, topic);

        let expected = digits(value, level);
        for (segment, digit) in segments.iter().zip(expected) {
            assert_eq!(segment.len(), 1);
            assert_eq!(segment.as_bytes()[0] - b'0', digit, "seed {}", seed);
            assert!(digit <= 3);
        }
    }
}

#[test]
fn test_prefix_counts_toward_level() {
    let value = 0xffff_0000_0000_0000;
    let topic = build_topic("/0/1", value, 5);
    assert_eq!(topic, "/0/1/3/3/3");
    assert_eq!(prefix_depth("/0/1"), 2);

    // Prefix at or beyond the level adds nothing.
    assert_eq!(build_topic("/0/1/2", value, 3), "/0/1/2");
    assert_eq!(build_topic("/0/1/2", value, 2), "/0/1/2");
}

#[test]
fn test_topic_prefix_of_deeper_topic() {
    for seed in 0..SEEDS {
        let mut rng = DeterministicRng::new(seed);
        let value = rng.next_u64();
        let level = rng.gen_range(1, MAX_LEVELS as u64) as usize;

        let shallow = build_topic("", value, level);
        let deep = build_topic("", value, MAX_LEVELS);
        assert!(deep.starts_with(&shallow), "seed {}", seed);
    }
}

// ============================================================================
// Decoding
// ============================================================================

#[test]
fn test_decoded_length_many_seeds() {
    for seed in 0..SEEDS {
        let mut rng = DeterministicRng::new(seed);
        let value = rng.next_u64();
        let level = rng.gen_range(2, MAX_LEVELS as u64 + 1) as usize;

        let topic = build_topic("", value, level);
        let token = decode_topic(&topic).unwrap();
        assert_eq!(token.len(), expected_token_len(level), "seed {} topic {}", seed, topic);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(u64::from(token.face()), value >> 62);
    }
}

#[test]
fn test_known_tokens() {
    assert_eq!(decode_topic("/0/2/3/2").unwrap().as_str(), "174");
    assert_eq!(decode_topic("/1/0").unwrap().as_str(), "24");
    assert_eq!(decode_topic("/5/3").unwrap().as_str(), "bc");
    // separators are optional
    assert_eq!(decode_topic("0232").unwrap().as_str(), "174");
}

#[test]
fn test_shallow_cell_contains_deeper_cell() {
    for seed in 0..SEEDS {
        let mut rng = DeterministicRng::new(seed);
        let value = rng.next_u64();
        let level = rng.gen_range(2, 31) as usize;

        let area = decode_topic(&build_topic("", value, level)).unwrap();
        let point = decode_topic(&build_topic("", value, 31)).unwrap();
        assert!(area.contains(&point), "seed {} level {}", seed, level);

        // A different face is never contained.
        let other_face = ((value >> 62) + 1) % 4;
        let other = decode_topic(&build_topic(&format!("/{}", other_face), value, 31)).unwrap();
        assert!(!area.contains(&other), "seed {}", seed);
    }
}

#[test]
fn test_malformed_topics() {
    for topic in ["", "/", "//", "/0", "3"] {
        let err = decode_topic(topic).unwrap_err();
        assert!(
            matches!(err, CodecError::Malformed { .. }),
            "{:?} -> {:?}",
            topic,
            err
        );
        assert_eq!(err.topic(), topic);
    }
}

#[test]
fn test_invalid_digits() {
    assert!(matches!(
        decode_topic("/6/1"),
        Err(CodecError::InvalidFace { digit: '6', .. })
    ));
    assert!(matches!(
        decode_topic("/x/1"),
        Err(CodecError::InvalidFace { digit: 'x', .. })
    ));
    assert!(matches!(
        decode_topic("/0/1/4"),
        Err(CodecError::InvalidDigit {
            digit: '4',
            position: 2,
            ..
        })
    ));
    assert!(matches!(
        decode_topic("/0/a"),
        Err(CodecError::InvalidDigit { position: 1, .. })
    ));
}

#[test]
fn test_location_aware_prefix_faces() {
    // Faces 4 and 5 only appear through an explicit prefix.
    for face in 4..=5 {
        let topic = build_topic(&format!("/{}", face), 0, 4);
        let token = decode_topic(&topic).unwrap();
        assert_eq!(u64::from(token.face()), face);
    }
}
