use serde_json::Value;

/// Placeholder shown when a row carries nothing usable as a display name.
/// Rows that normalize to this are dropped before aggregation.
pub const UNKNOWN_NAME: &str = "—";

/// One backend row reduced to the canonical field set.
///
/// `None` always means "missing", never zero; zero is a valid score.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub entity_id: Option<String>,
    pub display_name: String,
    pub score: Option<f64>,
    pub volume: Option<f64>,
    pub sentiment: Option<f64>,
    pub rank: Option<u32>,
}

/// Score aliases in precedence order. The precomputed aggregate field wins
/// over the raw aliases when a row carries both.
const SCORE_ALIASES: &[&str] = &["_computed_value", "score", "iap", "iap_score", "value"];

const VOLUME_ALIASES: &[&str] = &["volume_total", "volume"];
const SENTIMENT_ALIASES: &[&str] = &["sentiment_score", "sentiment"];
const RANK_ALIASES: &[&str] = &["rank_position", "rank"];
const ID_ALIASES: &[&str] = &["club_id", "entity_id", "id"];

/// Display-name rules evaluated top to bottom; first hit wins.
const NAME_RULES: &[fn(&Value) -> Option<String>] = &[
    nested_entity_name,
    flat_entity_name,
    entity_field_as_string,
    id_placeholder,
];

/// Reduce one raw row to `NormalizedRow`. Never fails: a malformed row
/// comes back with the unknown-name sentinel and all fields `None`.
pub fn normalize(row: &Value) -> NormalizedRow {
    NormalizedRow {
        entity_id: pick_string(row, ID_ALIASES),
        display_name: display_name(row),
        score: pick_number(row, SCORE_ALIASES),
        volume: pick_number(row, VOLUME_ALIASES),
        sentiment: pick_number(row, SENTIMENT_ALIASES),
        rank: pick_rank(row),
    }
}

pub fn display_name(row: &Value) -> String {
    if !row.is_object() {
        return UNKNOWN_NAME.to_string();
    }
    for rule in NAME_RULES {
        if let Some(name) = rule(row) {
            return name;
        }
    }
    UNKNOWN_NAME.to_string()
}

fn nested_entity_name(row: &Value) -> Option<String> {
    let club = row.get("club")?;
    if !club.is_object() {
        return None;
    }
    pick_string(club, &["name", "club_name"])
}

fn flat_entity_name(row: &Value) -> Option<String> {
    pick_string(row, &["club_name", "name"])
}

fn entity_field_as_string(row: &Value) -> Option<String> {
    match row.get("club") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn id_placeholder(row: &Value) -> Option<String> {
    let id = pick_string(row, ID_ALIASES)?;
    Some(format!("{}…", id.chars().take(8).collect::<String>()))
}

/// First non-empty string under any of `keys`.
pub fn pick_string(value: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = value.get(key).and_then(Value::as_str) {
            let s = s.trim();
            if !s.is_empty() {
                return Some(s.to_string());
            }
        }
        // Ids sometimes arrive as bare numbers.
        if let Some(n) = value.get(key).and_then(Value::as_u64) {
            return Some(n.to_string());
        }
    }
    None
}

/// First parseable number under any of `keys`.
pub fn pick_number(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| parse_score(value.get(key)?))
}

fn pick_rank(row: &Value) -> Option<u32> {
    let v = pick_number(row, RANK_ALIASES)?;
    if v >= 1.0 && v.fract() == 0.0 {
        Some(v as u32)
    } else {
        None
    }
}

/// Lenient numeric parse. Strings use comma-as-decimal (pt-BR) first,
/// then dot-decimal. Absent, empty or unparseable values are `None` —
/// never coerced to zero.
pub fn parse_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(raw) => {
            let s = raw.trim();
            if s.is_empty() || s == "-" {
                return None;
            }
            s.replace(',', ".")
                .parse::<f64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok())
                .filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// The one display-time substitution for missing scores. Charts and tables
/// render 0.0; ranking and trend logic must keep working with the `Option`.
pub fn display_score(score: Option<f64>) -> f64 {
    score.unwrap_or(0.0)
}

/// Case-folded, diacritic-stripped, whitespace-collapsed form of a display
/// name. Two names with the same key are the same entity when no stable id
/// exists.
pub fn normalized_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.push(fold_diacritic(c));
    }
    out
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}
