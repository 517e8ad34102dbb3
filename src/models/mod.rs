use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Free,
    Pro,
    Business,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Free => "free",
            PlanType::Pro => "pro",
            PlanType::Business => "business",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(PlanType::Free),
            "pro" => Some(PlanType::Pro),
            "business" => Some(PlanType::Business),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub credits_remaining: i64,
    pub plan_type: PlanType,
}

/// A saved transformation result. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanizedText {
    pub id: String,
    pub title: Option<String>,
    pub original_text: String,
    pub humanized_text: String,
    pub credits_used: i64,
    pub created_at: String,
}

// --- Auth ---
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub profile: Profile,
}

// --- Humanizer ---
#[derive(Debug, Deserialize)]
pub struct HumanizeRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct HumanizeResponse {
    pub humanized_text: String,
    pub cost_in_credits: i64,
    pub request_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveTextRequest {
    #[serde(default)]
    pub title: Option<String>,
    pub original_text: String,
    pub humanized_text: String,
    pub request_token: String,
}

#[derive(Debug, Serialize)]
pub struct SaveTextResponse {
    pub text: HumanizedText,
    pub credits_remaining: i64,
}

// --- Credits ---
#[derive(Debug, Serialize)]
pub struct TextSummary {
    pub id: String,
    pub credits_used: i64,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub credits_remaining: i64,
    pub plan_type: PlanType,
    pub recent_texts: Vec<TextSummary>,
}

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct TopUpResponse {
    pub credited: i64,
    pub new_balance: i64,
}

#[derive(Debug, Deserialize)]
pub struct PlanChangeRequest {
    pub plan_type: PlanType,
}

// --- Health ---
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: u64,
}
