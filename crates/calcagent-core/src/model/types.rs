/// Output encoding requested from the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    /// Native structured-output mode (`application/json`).
    Json,
}

/// Sampling configuration for a single request.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: Option<u32>,
    pub response_format: ResponseFormat,
}

impl GenerationConfig {
    pub fn text(temperature: f32, top_p: f32, max_output_tokens: u32) -> Self {
        Self {
            temperature,
            top_p,
            max_output_tokens: Some(max_output_tokens),
            response_format: ResponseFormat::Text,
        }
    }

    /// Structured output runs cooler than free text.
    pub fn json() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.95,
            max_output_tokens: None,
            response_format: ResponseFormat::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HarmCategory {
    Harassment,
    HateSpeech,
    SexuallyExplicit,
    DangerousContent,
}

impl HarmCategory {
    pub const ALL: [HarmCategory; 4] = [
        HarmCategory::Harassment,
        HarmCategory::HateSpeech,
        HarmCategory::SexuallyExplicit,
        HarmCategory::DangerousContent,
    ];

    pub fn as_api_str(self) -> &'static str {
        match self {
            HarmCategory::Harassment => "HARM_CATEGORY_HARASSMENT",
            HarmCategory::HateSpeech => "HARM_CATEGORY_HATE_SPEECH",
            HarmCategory::SexuallyExplicit => "HARM_CATEGORY_SEXUALLY_EXPLICIT",
            HarmCategory::DangerousContent => "HARM_CATEGORY_DANGEROUS_CONTENT",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockThreshold {
    BlockNone,
    BlockOnlyHigh,
    BlockMediumAndAbove,
    BlockLowAndAbove,
}

impl BlockThreshold {
    pub fn as_api_str(self) -> &'static str {
        match self {
            BlockThreshold::BlockNone => "BLOCK_NONE",
            BlockThreshold::BlockOnlyHigh => "BLOCK_ONLY_HIGH",
            BlockThreshold::BlockMediumAndAbove => "BLOCK_MEDIUM_AND_ABOVE",
            BlockThreshold::BlockLowAndAbove => "BLOCK_LOW_AND_ABOVE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SafetySetting {
    pub category: HarmCategory,
    pub threshold: BlockThreshold,
}

/// Every category set to `BLOCK_NONE`.
pub fn permissive_safety_settings() -> Vec<SafetySetting> {
    HarmCategory::ALL
        .into_iter()
        .map(|category| SafetySetting {
            category,
            threshold: BlockThreshold::BlockNone,
        })
        .collect()
}

/// Normalized request for a single model call.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub prompt: String,
    pub config: GenerationConfig,
}

/// Raw model answer, before the client decides whether it counts as success.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    /// Set when the prompt itself was refused by the safety filter.
    pub block_reason: Option<String>,
    pub finish_reason: Option<String>,
}

/// Entry from the provider's model catalog.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub display_name: Option<String>,
    pub supported_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generate_content(&self) -> bool {
        self.supported_methods.iter().any(|m| m == "generateContent")
    }
}
