// tests/extractor.rs
//
// Extraction cascade over hand-picked and randomized model outputs, plus the
// full stream → accumulate → extract path.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

use terratrack::analyze::accumulator::accumulate;
use terratrack::analyze::ai_adapter::{GenerativeSource, MockSource, PromptMessage};
use terratrack::analyze::extract::{extract, Extraction, ParseTier};
use terratrack::analyze::{ClimateAnalyst, ParsedResponse, SessionStore};

const VALID: &str = r#"{"content":"CO2 rose 1.1% in 2023.\nSee sources.","sources":[{"title":"Global Carbon Budget","url":"https://globalcarbonbudget.org","type":"data","reliability":5}],"visualization":{"type":"bar","title":"Emissions","chartData":{"labels":["2022","2023"],"datasets":[{"label":"Gt","data":[36.8,37.2]}]},"insights":["Growth slowed"]}}"#;

#[test]
fn handpicked_inputs_never_fail() {
    let cases = [
        "",
        "   ",
        "plain prose with no braces",
        VALID,
        "{\"content\":\"a\",}",
        "```json\n{\"content\":\"fenced\"}\n```",
        "Sure! Here you go: {\"content\":\"wrapped\"} Hope that helps.",
        "{\"content\":\"abc\",\"sources\":[{\"title\":\"x\"",
        "{{{{[[[[",
        "}]\"\\",
        "{\"content\": \"unterminated",
        "[1,2,3]",
        "null",
    ];
    for c in cases {
        let r = extract(c).into_response();
        // serializable means well-formed
        serde_json::to_string(&r).expect("serializable response");
    }
}

#[test]
fn randomized_inputs_never_fail() {
    let alphabet: Vec<char> = "{}[]\":,\\ abcn\n0123456789.-tfu`".chars().collect();
    let mut rng = StdRng::seed_from_u64(0x7e77a);
    for _ in 0..2_000 {
        let len = rng.random_range(0..80);
        let s: String = (0..len)
            .map(|_| alphabet[rng.random_range(0..alphabet.len())])
            .collect();
        let _ = extract(&s).into_response();

        // truncations of a valid document
        let cut = rng.random_range(0..=VALID.len());
        if VALID.is_char_boundary(cut) {
            let _ = extract(&VALID[..cut]).into_response();
        }
    }
}

#[test]
fn valid_input_parses_directly_and_matches_plain_decode() {
    let out = extract(VALID);
    let direct: serde_json::Value = serde_json::from_str(VALID).unwrap();
    match out {
        Extraction::Parsed { response, tier } => {
            assert_eq!(tier, ParseTier::Direct);
            assert_eq!(response, ParsedResponse::from_value(&direct));
            assert_eq!(response.sources.len(), 1);
            assert_eq!(response.visualization.unwrap().chart_data.labels, ["2022", "2023"]);
        }
        other => panic!("expected direct parse, got {}", other.tier_label()),
    }
}

const DOCS: [&str; 6] = [
    VALID,
    r#"{"content":"Use {curly} and [square] brackets","sources":[]}"#,
    r#"{"content":"","sources":[],"visualization":null}"#,
    r#"{"content":"Quote \"x\" and \\ backslash","sources":[{"title":"A","url":"https://a.example"}]}"#,
    r#"{"content":"```json\n{}\n```","sources":[]}"#,
    r#"{"visualization":{"type":"line","title":"T","chartData":{"labels":["a"],"datasets":[{"label":"l","data":[1]}]}},"content":"fields in any order"}"#,
];

#[test]
fn valid_documents_agree_across_direct_span_and_fence() {
    for doc in DOCS {
        let expected = ParsedResponse::from_value(&serde_json::from_str(doc).unwrap());
        let wrapped = [
            (doc.to_string(), ParseTier::Direct),
            (format!("Here is the answer: {doc} Let me know."), ParseTier::Span),
            (format!("```json\n{doc}\n```"), ParseTier::Fenced),
            (format!("Sure.\n```\n{doc}\n```\nDone."), ParseTier::Fenced),
        ];
        for (input, want) in wrapped {
            match extract(&input) {
                Extraction::Parsed { response, tier } => {
                    assert_eq!(tier, want, "{input}");
                    assert_eq!(response, expected, "{input}");
                }
                other => panic!("{input}: got {}", other.tier_label()),
            }
        }
    }
}

#[test]
fn fence_inside_content_keeps_full_answer() {
    let text = "```json\n{\"content\":\"Run:\\n```bash\\nls\\n```\\nThen check AQI.\",\"sources\":[]}\n```";
    let r = extract(text).into_response();
    assert_eq!(r.content, "Run:\n```bash\nls\n```\nThen check AQI.");
}

#[test]
fn truncation_with_braces_inside_strings_is_repaired() {
    let out = extract(r#"{"content":"Use {curly} and [square] brackets","sources":["#);
    assert!(matches!(out, Extraction::Parsed { tier: ParseTier::Repaired, .. }), "{out:?}");
    assert_eq!(out.response().content, "Use {curly} and [square] brackets");

    let out = extract(r#"Answer: {"content":"a } b","sources":[],} trailing words"#);
    assert!(matches!(out, Extraction::Parsed { tier: ParseTier::Repaired, .. }), "{out:?}");
    assert_eq!(out.response().content, "a } b");
}

#[test]
fn truncated_sources_are_salvaged_with_content() {
    let out = extract(r#"{"content":"abc","sources":[{"title":"x""#);
    assert!(!out.is_fallback());
    let r = out.into_response();
    assert_eq!(r.content, "abc");
    assert!(r.sources.is_empty());
}

#[tokio::test]
async fn mumbai_chunks_reassemble_and_parse() {
    let src = MockSource::chunks([
        "{\"content\":\"Mumbai ",
        "AQI is high\",\"sources\":[],\"visuali",
        "zation\":null}",
    ]);
    let stream = src
        .stream(&[PromptMessage::user("Mumbai air quality")])
        .await
        .unwrap();
    let text = accumulate(stream).await.unwrap();
    assert_eq!(
        text,
        r#"{"content":"Mumbai AQI is high","sources":[],"visualization":null}"#
    );

    let out = extract(&text);
    assert_eq!(out.tier_label(), "direct");
    let r = out.into_response();
    assert_eq!(
        serde_json::to_value(&r).unwrap(),
        json!({"content": "Mumbai AQI is high", "sources": [], "visualization": null})
    );
}

#[tokio::test]
async fn analyst_runs_the_same_scenario() {
    let src = MockSource::chunks([
        "{\"content\":\"Mumbai ",
        "AQI is high\",\"sources\":[],\"visuali",
        "zation\":null}",
    ]);
    let analyst = ClimateAnalyst::new(Arc::new(src), SessionStore::new(10), Duration::from_secs(5));
    let r = analyst.analyze(Some("s"), "Mumbai air quality", false).await.unwrap();
    assert_eq!(r.content, "Mumbai AQI is high");
    assert!(r.sources.is_empty());
    assert!(r.visualization.is_none());
}
