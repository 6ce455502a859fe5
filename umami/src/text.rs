//! Small text helpers shared by the chat surfaces.

/// Store type → emoji used on result cards.
pub const TYPE_ICON: &[(&str, &str)] = &[
    ("cafe", "☕"),
    ("coffee", "☕"),
    ("bar", "🍺"),
    ("ramen", "🍜"),
    ("yakiniku", "🍖"),
    ("sushi", "🍣"),
    ("restaurant", "🍽️"),
    ("french", "🥐"),
    ("italian", "🍝"),
    ("izakaya", "🍶"),
    ("fastfood", "🍔"),
    ("bistro", "🥗"),
];

/// Subtype fragment → emoji. Matched by substring, first hit wins.
pub const SUBTYPE_ICON: &[(&str, &str)] = &[
    ("スイーツ", "🍰"),
    ("軽食", "🥪"),
    ("デート", "💑"),
    ("おしゃれ", "✨"),
    ("静か", "🤫"),
    ("カジュアル", "🙂"),
    ("居酒屋", "🍶"),
];

pub fn type_icon(kind: &str) -> &'static str {
    let lower = kind.to_lowercase();
    TYPE_ICON
        .iter()
        .find(|(k, _)| *k == lower)
        .map(|(_, v)| *v)
        .unwrap_or("🍽️")
}

pub fn subtype_icon(subtype: &str) -> &'static str {
    SUBTYPE_ICON
        .iter()
        .find(|(k, _)| subtype.contains(k))
        .map(|(_, v)| *v)
        .unwrap_or("✨")
}

/// `★★★★☆  4.2` style rating line; "評価なし" when absent.
pub fn rating_stars(rating: Option<f64>) -> String {
    let Some(rating) = rating else {
        return "評価なし".to_string();
    };

    let filled = rating.round().clamp(0.0, 5.0) as usize;
    let stars = "★".repeat(filled);
    let empty = "☆".repeat(5 - filled);
    format!("{stars}{empty}  {rating}")
}

/// Google price_level (0–4) → Japanese price band text.
pub fn price_band(price_level: Option<u8>) -> &'static str {
    match price_level {
        Some(0) => "￥0〜",
        Some(1) => "￥〜1,000",
        Some(2) => "￥1,000〜2,000",
        Some(3) => "￥2,000〜5,000",
        Some(4) => "￥5,000〜",
        _ => "情報なし",
    }
}

/// Trim to a surface's message limit, ellipsis-suffixed. Counts chars,
/// not bytes, so multi-byte text never gets split mid-codepoint.
pub fn trim_to_limit(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Places photo URL for a photo reference.
pub fn photo_url(photo_reference: &str, api_key: &str) -> String {
    format!(
        "https://maps.googleapis.com/maps/api/place/photo?maxwidth=800&photo_reference={photo_reference}&key={api_key}"
    )
}
