//! Compare multilingual embedding models on news headline pairs
//!
//! Checks that paraphrased headlines (including cross-language pairs) score
//! above unrelated ones for every supported model.

use anyhow::Result;
use newsrank::semantic::{EmbeddingModel, TextEncoder};
use newsrank::vector::{FastEmbedGenerator, dot, model_to_string};
use std::sync::Arc;
use std::time::Instant;

/// Get a unique cache directory for each test to avoid conflicts
fn get_test_cache_dir(test_name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "newsrank_test_fastembed_{}_{}",
        test_name,
        std::process::id()
    ))
}

struct HeadlinePair {
    name: &'static str,
    first: &'static str,
    second: &'static str,
    expected_similar: bool,
}

const PAIRS: &[HeadlinePair] = &[
    HeadlinePair {
        name: "Same story, different outlets",
        first: "Central bank raises interest rates by a quarter point",
        second: "Rates climb 0.25% as the central bank tightens policy",
        expected_similar: true,
    },
    HeadlinePair {
        name: "Cross-language coverage",
        first: "Semiconductor exports hit a record high",
        second: "반도체 수출 사상 최대 기록",
        expected_similar: true,
    },
    HeadlinePair {
        name: "Unrelated stories",
        first: "Storm warning issued for the southern coast",
        second: "Striker signs four-year contract with champions",
        expected_similar: false,
    },
];

#[test]
#[ignore = "Downloads several hundred MB of models - run with --ignored for model comparison"]
fn compare_embedding_models() -> Result<()> {
    let cache_dir = get_test_cache_dir("compare_embedding_models");

    let models = [
        EmbeddingModel::ParaphraseMLMiniLML12V2,
        EmbeddingModel::MultilingualE5Small,
    ];

    for model in models {
        let name = model_to_string(&model);
        let started = Instant::now();
        let encoder = TextEncoder::new(Arc::new(FastEmbedGenerator::new(
            model,
            &cache_dir,
            false,
        )?));
        println!(
            "{name}: {} dimensions, loaded in {:?}",
            encoder.dimension(),
            started.elapsed()
        );

        let mut similar = Vec::new();
        let mut different = Vec::new();
        for pair in PAIRS {
            let vectors = encoder.encode_many(&[pair.first, pair.second])?;
            let score = dot(&vectors[0], &vectors[1]);
            println!("  {:<32} {score:.3}", pair.name);
            if pair.expected_similar {
                similar.push(score);
            } else {
                different.push(score);
            }
        }

        let worst_similar = similar.iter().copied().fold(f32::INFINITY, f32::min);
        let best_different = different.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert!(
            worst_similar > best_different,
            "{name}: paraphrases ({worst_similar:.3}) should outscore unrelated pairs ({best_different:.3})"
        );
    }

    let _ = std::fs::remove_dir_all(&cache_dir);
    Ok(())
}
