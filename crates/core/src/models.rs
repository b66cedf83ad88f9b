use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Available,
    Downloading,
    Downloaded,
    Loading,
    Loaded,
    Error,
}

impl ModelStatus {
    pub const ALL: [ModelStatus; 6] = [
        ModelStatus::Available,
        ModelStatus::Downloading,
        ModelStatus::Downloaded,
        ModelStatus::Loading,
        ModelStatus::Loaded,
        ModelStatus::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Available => "available",
            ModelStatus::Downloading => "downloading",
            ModelStatus::Downloaded => "downloaded",
            ModelStatus::Loading => "loading",
            ModelStatus::Loaded => "loaded",
            ModelStatus::Error => "error",
        }
    }

    /// Artifact is present on disk (loaded models keep their files).
    pub fn is_downloaded(&self) -> bool {
        matches!(self, ModelStatus::Downloaded | ModelStatus::Loaded)
    }

    /// Status a record falls back to when no in-flight work survives a restart.
    pub fn settled(&self) -> Self {
        match self {
            ModelStatus::Downloading => ModelStatus::Available,
            ModelStatus::Loading | ModelStatus::Loaded => ModelStatus::Downloaded,
            other => *other,
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    Programming,
    CodeAnalysis,
    SystemAdmin,
    General,
    Conversational,
}

impl ModelCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelCategory::Programming => "programming",
            ModelCategory::CodeAnalysis => "code_analysis",
            ModelCategory::SystemAdmin => "system_admin",
            ModelCategory::General => "general",
            ModelCategory::Conversational => "conversational",
        }
    }
}

/// Size class, ordered from smallest to largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    /// < 1GB
    Tiny,
    /// 1-4GB
    Small,
    /// 4-13GB
    Medium,
    /// 13-30GB
    Large,
    /// > 30GB
    XLarge,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
            ModelSize::XLarge => "xlarge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    Lightweight,
    Medium,
    Powerful,
}

impl PerformanceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceTier::Lightweight => "lightweight",
            PerformanceTier::Medium => "medium",
            PerformanceTier::Powerful => "powerful",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: ModelCategory,
    pub size: ModelSize,
    pub performance_tier: PerformanceTier,
    /// Download size in MB
    pub download_size_mb: u64,
    /// Resident memory requirement in MB
    pub memory_requirement_mb: u64,
    /// VRAM requirement in MB, if the model benefits from a GPU
    #[serde(default)]
    pub vram_requirement_mb: Option<u64>,
    pub status: ModelStatus,
    /// 0-100, only meaningful while downloading
    #[serde(default)]
    pub download_progress: f32,
    #[serde(default)]
    pub huggingface_repo: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ModelRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        category: ModelCategory,
        size: ModelSize,
        performance_tier: PerformanceTier,
        download_size_mb: u64,
        memory_requirement_mb: u64,
        vram_requirement_mb: Option<u64>,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            category,
            size,
            performance_tier,
            download_size_mb,
            memory_requirement_mb,
            vram_requirement_mb,
            status: ModelStatus::Available,
            download_progress: 0.0,
            huggingface_repo: None,
            license: None,
            tags: Vec::new(),
        }
    }

    pub fn with_repo(mut self, repo: &str, license: &str) -> Self {
        self.huggingface_repo = Some(repo.to_string());
        self.license = Some(license.to_string());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Built-in catalog of models the dashboard offers out of the box.
pub fn catalog() -> Vec<ModelRecord> {
    use ModelCategory::*;
    use PerformanceTier::*;

    vec![
        ModelRecord::new(
            "gpt2",
            "GPT-2 (Small)",
            "OpenAI's GPT-2 small model for text and code generation",
            Programming,
            ModelSize::Small,
            Lightweight,
            500,
            2000,
            None,
        )
        .with_repo("gpt2", "MIT")
        .with_tags(&["text-generation", "gpt", "lightweight", "generation"]),
        ModelRecord::new(
            "microsoft-dialoGPT-small",
            "DialoGPT Small",
            "Microsoft's DialoGPT small model for conversational AI",
            Conversational,
            ModelSize::Small,
            Lightweight,
            350,
            1500,
            None,
        )
        .with_repo("microsoft/DialoGPT-small", "MIT")
        .with_tags(&["conversational", "dialogue", "lightweight", "generation"]),
        ModelRecord::new(
            "codebert-base-mlm",
            "CodeBERT Base MLM",
            "Microsoft's CodeBERT for masked language modeling on code",
            Programming,
            ModelSize::Small,
            Lightweight,
            500,
            2000,
            None,
        )
        .with_repo("microsoft/codebert-base-mlm", "MIT")
        .with_tags(&["code", "programming", "mlm", "lightweight"]),
        ModelRecord::new(
            "distilgpt2",
            "DistilGPT-2",
            "Distilled version of GPT-2 for text generation",
            Programming,
            ModelSize::Small,
            Lightweight,
            350,
            1500,
            None,
        )
        .with_repo("distilgpt2", "Apache-2.0")
        .with_tags(&["text-generation", "gpt", "lightweight"]),
        ModelRecord::new(
            "tinyllama-1.1b",
            "TinyLlama 1.1B",
            "Compact language model for code and chat",
            Conversational,
            ModelSize::Small,
            Lightweight,
            2200,
            4000,
            Some(2000),
        )
        .with_repo("TinyLlama/TinyLlama-1.1B-Chat-v1.0", "Apache-2.0")
        .with_tags(&["llama", "chat", "lightweight", "multilingual"]),
        ModelRecord::new(
            "codebert-base",
            "CodeBERT Base",
            "Microsoft's CodeBERT for code understanding",
            CodeAnalysis,
            ModelSize::Medium,
            Medium,
            1200,
            6000,
            Some(4000),
        )
        .with_repo("microsoft/codebert-base", "MIT")
        .with_tags(&["code", "programming", "bert", "medium"]),
        ModelRecord::new(
            "codet5-base",
            "CodeT5 Base",
            "Salesforce's CodeT5 for code generation and understanding",
            Programming,
            ModelSize::Medium,
            Medium,
            900,
            5000,
            Some(3000),
        )
        .with_repo("Salesforce/codet5-base", "Apache-2.0")
        .with_tags(&["code", "t5", "generation", "medium"]),
        ModelRecord::new(
            "starcoder-base",
            "StarCoder Base",
            "BigCode's StarCoder for advanced code generation",
            Programming,
            ModelSize::Large,
            Powerful,
            15000,
            32000,
            Some(16000),
        )
        .with_repo("bigcode/starcoder", "BigCode OpenRAIL-M")
        .with_tags(&["code", "large", "powerful", "generation"]),
        ModelRecord::new(
            "deepseek-coder-6.7b",
            "DeepSeek Coder 6.7B",
            "DeepSeek's advanced code generation model",
            Programming,
            ModelSize::Large,
            Powerful,
            13000,
            28000,
            Some(14000),
        )
        .with_repo("deepseek-ai/deepseek-coder-6.7b-base", "Custom")
        .with_tags(&["code", "deepseek", "large", "advanced"]),
        ModelRecord::new(
            "bash-gpt",
            "Bash GPT",
            "Specialized model for bash scripting and system administration",
            SystemAdmin,
            ModelSize::Small,
            Lightweight,
            800,
            3000,
            Some(1500),
        )
        .with_repo("microsoft/DialoGPT-medium", "MIT")
        .with_tags(&["bash", "system", "admin", "scripting"]),
    ]
}
