use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use umami::config::GoogleConfig;
use umami::error::UmamiError;
use umami::models::GeoPoint;
use umami::places::{GooglePlaces, PlaceDirectory};

fn google_config() -> GoogleConfig {
    GoogleConfig {
        api_key: "test-key".to_string(),
        language: "ja".to_string(),
        timeout_secs: 5,
    }
}

fn client(server: &MockServer) -> GooglePlaces {
    GooglePlaces::with_base_url(&google_config(), &server.uri()).unwrap()
}

#[tokio::test]
async fn test_search_parses_candidates_and_sends_japanese() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/maps/api/place/textsearch/json"))
        .and(query_param("query", "ラーメン 渋谷"))
        .and(query_param("language", "ja"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "name": "ラーメン花月", "place_id": "p1", "formatted_address": "渋谷区1-1" },
                { "name": "麺屋ソクラテス", "place_id": "p2" },
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let candidates = client(&server).search("ラーメン 渋谷").await.unwrap();

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].place_id, "p1");
    assert_eq!(candidates[0].name, "ラーメン花月");
    assert_eq!(candidates[0].address, "渋谷区1-1");
    // formatted_address is optional in the upstream payload
    assert_eq!(candidates[1].address, "");
}

#[tokio::test]
async fn test_search_with_no_results_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/maps/api/place/textsearch/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "ZERO_RESULTS" })),
        )
        .mount(&server)
        .await;

    let candidates = client(&server).search("存在しない店").await.unwrap();
    assert!(candidates.is_empty());
}

#[tokio::test]
async fn test_details_maps_all_fields() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/maps/api/place/details/json"))
        .and(query_param("place_id", "p1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "name": "喫茶ソクラテス",
                "place_id": "p1",
                "formatted_address": "新宿区2-2",
                "rating": 4.4,
                "price_level": 2,
                "opening_hours": { "weekday_text": ["月曜日: 9時00分～18時00分"] },
                "website": "https://socrates.example",
                "url": "https://maps.google.com/?cid=42",
                "reviews": [
                    { "text": "落ち着く" },
                    { "text": "" },
                ],
                "types": ["cafe", "food"],
                "geometry": { "location": { "lat": 35.69, "lng": 139.70 } },
                "photos": [{ "photo_reference": "photo-ref-1" }],
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let details = client(&server).details("p1").await.unwrap();

    assert_eq!(details.name, "喫茶ソクラテス");
    assert_eq!(details.rating, Some(4.4));
    assert_eq!(details.price_level, Some(2));
    assert_eq!(details.opening_hours, vec!["月曜日: 9時00分～18時00分"]);
    assert_eq!(details.website.as_deref(), Some("https://socrates.example"));
    assert_eq!(details.photo_reference.as_deref(), Some("photo-ref-1"));
    // reviews with empty text are dropped
    assert_eq!(details.reviews.len(), 1);
    assert_eq!(details.category_hints, vec!["cafe", "food"]);
    assert_eq!(details.location, Some(GeoPoint::new(35.69, 139.70)));
}

#[tokio::test]
async fn test_details_without_result_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/maps/api/place/details/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "NOT_FOUND" })),
        )
        .mount(&server)
        .await;

    let err = client(&server).details("missing").await.unwrap_err();
    assert!(matches!(err, UmamiError::NotFound(_)));
}

#[tokio::test]
async fn test_geocode_takes_first_result() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/maps/api/geocode/json"))
        .and(query_param("address", "東京駅"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "geometry": { "location": { "lat": 35.6812, "lng": 139.7671 } } },
                { "geometry": { "location": { "lat": 0.0, "lng": 0.0 } } },
            ]
        })))
        .mount(&server)
        .await;

    let point = client(&server).geocode("東京駅").await.unwrap();
    assert_eq!(point, GeoPoint::new(35.6812, 139.7671));
}

#[tokio::test]
async fn test_geocode_without_results_is_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/maps/api/geocode/json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "results": [] })),
        )
        .mount(&server)
        .await;

    let err = client(&server).geocode("???").await.unwrap_err();
    assert!(matches!(err, UmamiError::NotFound(_)));
}
