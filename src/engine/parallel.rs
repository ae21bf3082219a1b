//! Batch Code Generation
//!
//! Generates code for many independent templates at once. With the
//! `parallel` feature the batch runs on rayon's work-stealing pool;
//! without it the same functions run sequentially.
//!
//! ```toml
//! [dependencies]
//! razorblade = { version = "0.1", features = ["parallel"] }
//! ```
//!
//! Results are always in input order.

use super::codegen::GeneratorResults;
use super::error::ParseError;
use super::parser::ParserResults;
use super::template_engine::TemplateEngine;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Generate code for every input
#[cfg(feature = "rayon")]
pub fn generate_batch(
    engine: &TemplateEngine,
    inputs: &[&str],
) -> Vec<Result<GeneratorResults, ParseError>> {
    inputs
        .par_iter()
        .map(|input| engine.generate_code(input))
        .collect()
}

/// Generate code for every input (sequential fallback)
#[cfg(not(feature = "rayon"))]
pub fn generate_batch(
    engine: &TemplateEngine,
    inputs: &[&str],
) -> Vec<Result<GeneratorResults, ParseError>> {
    inputs
        .iter()
        .map(|input| engine.generate_code(input))
        .collect()
}

/// Parse every input without generating code
#[cfg(feature = "rayon")]
pub fn parse_batch(
    engine: &TemplateEngine,
    inputs: &[&str],
) -> Vec<Result<ParserResults, ParseError>> {
    inputs
        .par_iter()
        .map(|input| engine.parse_template(input))
        .collect()
}

/// Parse every input (sequential fallback)
#[cfg(not(feature = "rayon"))]
pub fn parse_batch(
    engine: &TemplateEngine,
    inputs: &[&str],
) -> Vec<Result<ParserResults, ParseError>> {
    inputs
        .iter()
        .map(|input| engine.parse_template(input))
        .collect()
}

/// Generate code for a batch using a dedicated pool sized by `config`
#[cfg(feature = "rayon")]
pub fn generate_batch_with_config(
    engine: &TemplateEngine,
    inputs: &[&str],
    config: &ParallelConfig,
) -> Vec<Result<GeneratorResults, ParseError>> {
    if inputs.len() < config.min_chunk_size {
        return inputs
            .iter()
            .map(|input| engine.generate_code(input))
            .collect();
    }
    let pool = config
        .num_threads
        .and_then(|threads| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .ok()
        });
    match pool {
        Some(pool) => pool.install(|| generate_batch(engine, inputs)),
        None => generate_batch(engine, inputs),
    }
}

/// Generate code for a batch (sequential fallback)
#[cfg(not(feature = "rayon"))]
pub fn generate_batch_with_config(
    engine: &TemplateEngine,
    inputs: &[&str],
    _config: &ParallelConfig,
) -> Vec<Result<GeneratorResults, ParseError>> {
    generate_batch(engine, inputs)
}

/// Configuration for batch generation
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Number of threads to use (None = rayon's global pool)
    pub num_threads: Option<usize>,
    /// Batches smaller than this run sequentially
    pub min_chunk_size: usize,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            min_chunk_size: 1,
        }
    }
}

impl ParallelConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of threads to use
    pub fn with_num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Set the smallest batch worth parallelizing
    pub fn with_min_chunk_size(mut self, size: usize) -> Self {
        self.min_chunk_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_batch_keeps_order() {
        let engine = TemplateEngine::default();
        let inputs = ["@a", "@b", "@c"];
        let results = generate_batch(&engine, &inputs);
        assert_eq!(results.len(), 3);
        for (result, name) in results.iter().zip(["a", "b", "c"]) {
            let code = &result.as_ref().unwrap().generated_code;
            assert!(code.contains(&format!("Write({});", name)));
        }
    }

    #[test]
    fn test_parse_batch_reports_errors_per_input() {
        let engine = TemplateEngine::default();
        let results = parse_batch(&engine, &["@model A\n@model B", "ok"]);
        assert!(!results[0].as_ref().unwrap().success);
        assert!(results[1].as_ref().unwrap().success);
    }

    #[test]
    fn test_config_builder() {
        let config = ParallelConfig::new()
            .with_num_threads(2)
            .with_min_chunk_size(4);
        assert_eq!(config.num_threads, Some(2));
        let engine = TemplateEngine::default();
        let results = generate_batch_with_config(&engine, &["@x"], &config);
        assert!(results[0].is_ok());
    }
}
