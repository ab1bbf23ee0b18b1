//! Query scope validation.
//!
//! A fast local classifier that decides whether an utterance belongs to
//! the travel assistant at all, before any persistence or LLM spend.
//! Rules run in order: empty → invalid; malicious pattern → invalid;
//! greeting → valid; travel keywords → valid with keyword-scaled
//! confidence; short ambiguous → valid at 0.5; everything else → valid
//! at 0.3 and the LLM redirects.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Result of scope validation.
#[derive(Debug, Clone)]
pub struct QueryValidation {
    pub is_valid: bool,
    pub reason: Option<String>,
    pub confidence: f32,
}

static TRAVEL_KEYWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        // Trip management
        "trip", "trips", "vacation", "vacations", "travel", "traveling", "travelling",
        "journey", "getaway",
        // Transportation
        "flight", "flights", "fly", "flying", "airline", "airlines", "plane", "airport",
        "airports",
        // Accommodation
        "hotel", "hotels", "stay", "staying", "accommodation", "lodging", "room", "rooms",
        "resort", "resorts",
        // Pricing
        "price", "prices", "pricing", "cost", "costs", "cheap", "cheaper", "cheapest",
        "expensive", "budget", "deal", "deals", "discount",
        // Tracking
        "track", "tracking", "monitor", "monitoring", "watch", "watching", "alert",
        "alerts", "notify", "notification", "notifications",
        // Dates and scheduling
        "depart", "departure", "return", "arrive", "arrival", "date", "dates", "book",
        "booking",
        // Locations
        "destination", "destinations", "origin",
        // Actions
        "create", "list", "show", "delete", "pause", "resume", "refresh", "update",
        // General travel terms
        "itinerary", "passenger", "passengers", "adult", "adults", "traveler",
        "travelers", "class", "economy", "business", "first",
        // Airport codes (common examples)
        "iata", "sfo", "lax", "jfk", "lga", "ewr", "ord", "atl", "dfw", "den", "sea",
        "mia", "bos", "phl", "hnl", "lhr", "cdg", "nrt", "hnd",
    ]
    .into_iter()
    .collect()
});

static NON_TRAVEL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Database/system operations
        r"(?i)\b(drop|delete|truncate|alter|create)\s+(table|database|schema|index)\b",
        r"(?i)\bsql\s*(injection|query|command)\b",
        r"(?i)\b(exec|execute|run)\s*(command|script|code|sql)\b",
        // Hacking/security attacks
        r"(?i)\b(hack|exploit|inject|bypass|crack)\b",
        r"(?i)\bpassword\s*(hash|crack|reset|dump)\b",
        r"(?i)\b(shell|terminal|bash|cmd|powershell)\s*(command|access)\b",
        // Code execution
        r"(?i)\b(eval|exec|subprocess|os\.system|import\s+os)\b",
        r"(?i)\bwrite\s*(file|code|script)\s+to\b",
        // System access
        r"(?i)\b(root|admin|sudo|privilege|escalat)\b",
        r"(?i)\baccess\s+(server|system|database|credentials)\b",
        // File operations outside the travel vocabulary
        r"(?i)\b(read|write|delete|modify)\s+(file|files|directory)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static scope pattern"))
    .collect()
});

static GREETING_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^(hi|hello|hey|greetings|good\s+(morning|afternoon|evening))[\s!.,]*$",
        r"(?i)^(thanks|thank\s+you|ok|okay|sure|yes|no|bye|goodbye)[\s!.,]*$",
        r"(?i)^(help|what\s+can\s+you\s+do|how\s+do\s+you\s+work)[\s!?.,]*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static greeting pattern"))
    .collect()
});

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("word pattern"));

fn travel_keyword_count(normalized: &str) -> usize {
    let words: HashSet<&str> = WORD.find_iter(normalized).map(|m| m.as_str()).collect();
    words
        .iter()
        .filter(|w| TRAVEL_KEYWORDS.contains(*w))
        .count()
}

/// Classify an utterance. Only rule 1 (empty) and rule 2 (malicious)
/// reject; everything else passes with a confidence the caller may use.
pub fn validate_query(query: &str) -> QueryValidation {
    let normalized = query.trim().to_lowercase();

    if normalized.is_empty() {
        return QueryValidation {
            is_valid: false,
            reason: Some("Empty query provided.".into()),
            confidence: 1.0,
        };
    }

    if let Some(pattern) = NON_TRAVEL_PATTERNS.iter().find(|p| p.is_match(&normalized)) {
        tracing::warn!(pattern = pattern.as_str(), "query matched non-travel pattern");
        return QueryValidation {
            is_valid: false,
            reason: Some("This request is outside my scope as a travel assistant.".into()),
            confidence: 0.95,
        };
    }

    if GREETING_PATTERNS.iter().any(|p| p.is_match(&normalized)) {
        return QueryValidation {
            is_valid: true,
            reason: None,
            confidence: 1.0,
        };
    }

    let keywords = travel_keyword_count(&normalized);
    if keywords > 0 {
        return QueryValidation {
            is_valid: true,
            reason: None,
            confidence: (0.7 + keywords as f32 * 0.1).min(1.0),
        };
    }

    // Short queries without travel keywords may be contextual follow-ups.
    if normalized.split_whitespace().count() <= 5 {
        return QueryValidation {
            is_valid: true,
            reason: None,
            confidence: 0.5,
        };
    }

    // Longer off-topic queries still pass; the system prompt makes the
    // LLM redirect them.
    tracing::info!("query has no travel keywords, allowing with low confidence");
    QueryValidation {
        is_valid: true,
        reason: Some("Query may be off-topic but allowing LLM to respond.".into()),
        confidence: 0.3,
    }
}
