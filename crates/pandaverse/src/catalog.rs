//! Models offered to clients, grouped by what they are good at.

use pandaverse_types::{CatalogEntry, ModelCatalog, ModelGroup};

const GROUPS: &[(&str, &[(&str, &str)])] = &[
    (
        "Coding Models",
        &[
            ("Qwen Coder 32B", "qwen/qwen-2.5-coder-32b-instruct:free"),
            ("Qwen3 Coder", "qwen/qwen3-coder:free"),
            ("DeepCoder 14B", "agentica-org/deepcoder-14b-preview:free"),
        ],
    ),
    (
        "Reasoning Models",
        &[
            ("DeepSeek R1", "deepseek/deepseek-r1:free"),
            ("R1 Chimera", "tngtech/deepseek-r1t-chimera:free"),
            (
                "R1 Distill Llama 70B",
                "deepseek/deepseek-r1-distill-llama-70b:free",
            ),
        ],
    ),
    (
        "General Models",
        &[
            ("GPT oss 20B", "openai/gpt-oss-20b:free"),
            ("Llama 3.3 70B", "meta-llama/llama-3.3-70b-instruct:free"),
            ("Llama 3.2 3B", "meta-llama/llama-3.2-3b-instruct:free"),
            ("Gemma 3 27B", "google/gemma-3-27b-it:free"),
            (
                "Mistral Small 24B",
                "mistralai/mistral-small-3.1-24b-instruct:free",
            ),
        ],
    ),
];

/// Build the catalog, listing Pollinations under its sentinel model value.
pub fn model_catalog(pollinations_sentinel: &str) -> ModelCatalog {
    let groups = GROUPS
        .iter()
        .map(|(title, models)| ModelGroup {
            title: title.to_string(),
            models: models
                .iter()
                .map(|(title, id)| CatalogEntry {
                    title: title.to_string(),
                    id: id.to_string(),
                })
                .collect(),
        })
        .collect();

    ModelCatalog {
        providers: vec![CatalogEntry {
            title: "Pollination.AI".to_string(),
            id: pollinations_sentinel.to_string(),
        }],
        groups,
    }
}
