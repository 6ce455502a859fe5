//! Prompt templates for the store-analysis completions.
//!
//! Plain `format!()` interpolation; every template instructs the model
//! to answer with a single JSON object whose field names match the
//! serde structs in [`crate::analysis`].

/// Summarize a review list into 良い点 / 気になる点 / まとめ sections.
pub fn review_summary_prompt(reviews: &[String]) -> String {
    let joined = reviews.join("\n");

    format!(
        r#"以下の口コミ一覧を元に、良い点／気になる点／一言まとめ を生成してください。
出力(JSON):
{{
  "positive": ["...", "..."],
  "negative": ["..."],
  "conclusion": "..."
}}
口コミ:
{joined}"#
    )
}

/// Infer a one-word store type and a short subtype description.
pub fn store_type_prompt(category_hints: &[String], summary: &str) -> String {
    format!(
        r#"以下の情報から、「店タイプ（1語）」と「サブタイプ（短い説明）」を推論してください。

Google Types:
{category_hints:?}

レビュー要約:
{summary}

出力(JSON):
{{
  "type": "cafe",
  "subtype": "コーヒーとスイーツ"
}}"#
    )
}

/// Infer up to three recommended menu items.
pub fn recommendations_prompt(category_hints: &[String], summary: &str, name: &str) -> String {
    format!(
        r#"以下の情報から、店のおすすめメニューを３つ推論してください。

店名: {name}
Google Types: {category_hints:?}
レビュー要約: {summary}

出力(JSON):
{{"recommendations": ["○○", "○○", "○○"]}}"#
    )
}

/// Extract atmosphere / purpose / feature tags.
pub fn tags_prompt(name: &str, category_hints: &[String], summary: &str) -> String {
    format!(
        r#"以下の店情報から適切なタグ(雰囲気/用途/特徴など)を抽出してください。

店名: {name}
Google Types: {category_hints:?}
レビュー要約:
{summary}

出力(JSON):
{{"tags": ["デート向け", "落ち着いた", "カフェ"]}}"#
    )
}
