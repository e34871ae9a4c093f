//! Integration tests for `OpenWeatherProvider` using wiremock HTTP mocks.

use weatherdash_core::{
    Unit, WeatherError, WeatherProvider, model::Coordinates,
    provider::openweather::OpenWeatherProvider,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_provider(server: &MockServer) -> OpenWeatherProvider {
    OpenWeatherProvider::with_endpoints(
        "test-key",
        &format!("{}/data/2.5", server.uri()),
        &format!("{}/geo/1.0", server.uri()),
        30,
    )
    .expect("provider construction should not fail")
}

fn current_body(name: &str, lat: f64, lon: f64) -> serde_json::Value {
    serde_json::json!({
        "coord": { "lon": lon, "lat": lat },
        "weather": [{ "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }],
        "main": {
            "temp": 18.5, "feels_like": 17.4, "temp_min": 16.2, "temp_max": 20.5,
            "pressure": 1015, "humidity": 55
        },
        "visibility": 10000,
        "wind": { "speed": 4.1, "deg": 240, "gust": 7.2 },
        "clouds": { "all": 5 },
        "dt": 1714557600,
        "sys": { "country": "FR", "sunrise": 1714537000, "sunset": 1714590000 },
        "name": name
    })
}

/// One sample at noon UTC on each of three consecutive days.
fn forecast_body() -> serde_json::Value {
    let entry = |dt: i64, temp: f64| {
        serde_json::json!({
            "dt": dt,
            "main": { "temp": temp, "feels_like": temp - 1.0, "humidity": 60.0, "pressure": 1012.0 },
            "weather": [{ "description": "few clouds", "icon": "02d" }],
            "wind": { "speed": 3.5 },
            "clouds": { "all": 20.0 }
        })
    };

    serde_json::json!({
        "cnt": 3,
        "list": [
            entry(1714564800, 14.4),
            entry(1714651200, 16.5),
            entry(1714737600, 12.6),
        ]
    })
}

fn error_body(code: u16, message: &str) -> serde_json::Value {
    serde_json::json!({ "cod": code.to_string(), "message": message })
}

async fn mount_weather_by_name(server: &MockServer, city: &str, status: u16) {
    for endpoint in ["/data/2.5/weather", "/data/2.5/forecast"] {
        let template = if status == 200 {
            let body = if endpoint.ends_with("weather") {
                current_body(city, 48.85, 2.35)
            } else {
                forecast_body()
            };
            ResponseTemplate::new(200).set_body_json(body)
        } else {
            ResponseTemplate::new(status).set_body_json(error_body(status, "failure"))
        };

        Mock::given(method("GET"))
            .and(path(endpoint))
            .and(query_param("q", city))
            .respond_with(template)
            .mount(server)
            .await;
    }
}

async fn mount_weather_at(server: &MockServer, name: &str, lat: &str, lon: &str) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", lat))
        .and(query_param("lon", lon))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body(name, 0.0, 0.0)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .and(query_param("lat", lat))
        .and(query_param("lon", lon))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fetch_by_city_name_combines_current_and_forecast() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", "Paris"))
        .and(query_param("units", "metric"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(current_body("Paris", 48.85, 2.35)))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .and(query_param("q", "Paris"))
        .and(query_param("units", "metric"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()))
        .mount(&server)
        .await;

    let provider = test_provider(&server);
    let report = provider
        .fetch_by_city_name("Paris", Unit::Metric)
        .await
        .expect("should load weather");

    let current = &report.current;
    assert_eq!(current.city, "Paris");
    assert_eq!(current.country, "FR");
    assert_eq!(current.temperature, 19);
    assert_eq!(current.temp_max, 21);
    assert_eq!(current.humidity, 55);
    assert_eq!(current.wind_gust, Some(7.2));
    assert_eq!(current.coordinates, Coordinates::new(48.85, 2.35));

    assert_eq!(report.forecast.len(), 3);
    assert!(report.forecast.windows(2).all(|w| w[0].date < w[1].date));
    assert_eq!(report.forecast[0].temp_max, 14);
    assert_eq!(report.forecast[1].temp_max, 17);
    assert_eq!(report.forecast[2].avg_temp, 13);
    assert_eq!(report.forecast[0].icon, "02d");
}

#[tokio::test]
async fn imperial_unit_is_forwarded() {
    let server = MockServer::start().await;

    for endpoint in ["/data/2.5/weather", "/data/2.5/forecast"] {
        let body = if endpoint.ends_with("weather") {
            current_body("Austin", 30.27, -97.74)
        } else {
            forecast_body()
        };
        Mock::given(method("GET"))
            .and(path(endpoint))
            .and(query_param("units", "imperial"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let provider = test_provider(&server);
    let report = provider
        .fetch_by_city_name("Austin", Unit::Imperial)
        .await
        .expect("should load weather");

    assert_eq!(report.current.city, "Austin");
}

#[tokio::test]
async fn unknown_city_falls_back_to_geocoding() {
    let server = MockServer::start().await;
    mount_weather_by_name(&server, "Springfeld", 404).await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "Springfeld"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "name": "Springfield", "state": "Illinois", "country": "US", "lat": 39.8, "lon": -89.6 },
            { "name": "Springfield", "state": "Missouri", "country": "US", "lat": 37.2, "lon": -93.3 }
        ])))
        .mount(&server)
        .await;

    mount_weather_at(&server, "Springfield", "39.8", "-89.6").await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/reverse"))
        .and(query_param("lat", "39.8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "name": "Springfield", "state": "Illinois", "country": "US", "lat": 39.8, "lon": -89.6 }
        ])))
        .mount(&server)
        .await;

    let provider = test_provider(&server);
    let report = provider
        .fetch_by_city_name("Springfeld", Unit::Metric)
        .await
        .expect("fallback should resolve the city");

    assert_eq!(report.current.city, "Springfield");
    assert_eq!(report.current.country, "US");
    assert_eq!(report.current.region.as_deref(), Some("Illinois"));
}

#[tokio::test]
async fn unknown_city_without_candidates_is_not_found() {
    let server = MockServer::start().await;
    mount_weather_by_name(&server, "Qwzx", 404).await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let provider = test_provider(&server);
    let err = provider
        .fetch_by_city_name("Qwzx", Unit::Metric)
        .await
        .unwrap_err();

    assert_eq!(err, WeatherError::CityNotFound);
}

#[tokio::test]
async fn failed_reverse_geocode_keeps_response_name() {
    let server = MockServer::start().await;
    mount_weather_at(&server, "Paris", "48.85", "2.35").await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/reverse"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = test_provider(&server);
    let report = provider
        .fetch_by_coordinates(Coordinates::new(48.85, 2.35), Unit::Metric)
        .await
        .expect("reverse geocoding failure should not be fatal");

    assert_eq!(report.current.city, "Paris");
    assert_eq!(report.current.country, "FR");
}

#[tokio::test]
async fn status_codes_map_to_error_kinds() {
    let cases = [
        (400, WeatherError::InvalidRequest),
        (401, WeatherError::AuthError),
        (429, WeatherError::RateLimited),
        (503, WeatherError::ServerError),
    ];

    for (status, expected) in cases {
        let server = MockServer::start().await;
        mount_weather_by_name(&server, "Paris", status).await;

        let provider = test_provider(&server);
        let err = provider
            .fetch_by_city_name("Paris", Unit::Metric)
            .await
            .unwrap_err();

        assert_eq!(err, expected, "status {status}");
    }
}

#[tokio::test]
async fn unexpected_status_uses_provider_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(418).set_body_json(error_body(418, "short and stout")),
        )
        .mount(&server)
        .await;

    let provider = test_provider(&server);
    let err = provider
        .fetch_by_city_name("Paris", Unit::Metric)
        .await
        .unwrap_err();

    assert_eq!(err, WeatherError::UnknownError("short and stout".into()));
}

#[tokio::test]
async fn malformed_payload_is_unknown_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"unexpected\": true}"))
        .mount(&server)
        .await;

    let provider = test_provider(&server);
    let err = provider
        .fetch_by_city_name("Paris", Unit::Metric)
        .await
        .unwrap_err();

    assert_eq!(err, WeatherError::unknown());
}

#[tokio::test]
async fn suggest_cities_builds_display_names() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .and(query_param("q", "spring"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "name": "Springfield", "state": "Illinois", "country": "US", "lat": 39.8, "lon": -89.6 },
            { "name": "Spring", "country": "US", "lat": 30.08, "lon": -95.42 }
        ])))
        .mount(&server)
        .await;

    let provider = test_provider(&server);
    let suggestions = provider.suggest_cities("spring", 5).await;

    assert_eq!(suggestions.len(), 2);
    assert_eq!(suggestions[0].display_name, "Springfield, Illinois, US");
    assert_eq!(suggestions[1].display_name, "Spring, US");
    assert_eq!(suggestions[1].coordinates, Coordinates::new(30.08, -95.42));
}

#[tokio::test]
async fn suggest_cities_swallows_errors() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/geo/1.0/direct"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let provider = test_provider(&server);
    assert!(provider.suggest_cities("paris", 5).await.is_empty());
}

#[tokio::test]
async fn short_queries_never_hit_the_network() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let provider = test_provider(&server);
    assert!(provider.suggest_cities("p", 5).await.is_empty());
    assert!(provider.suggest_cities("", 5).await.is_empty());
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    // Bind then release a port so nothing is listening on it.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .expect("ephemeral port")
        .port();
    let base = format!("http://127.0.0.1:{port}");

    let provider = OpenWeatherProvider::with_endpoints(
        "test-key",
        &format!("{base}/data/2.5"),
        &format!("{base}/geo/1.0"),
        5,
    )
    .expect("provider construction should not fail");

    let err = provider
        .fetch_by_city_name("Paris", Unit::Metric)
        .await
        .unwrap_err();
    assert_eq!(err, WeatherError::NetworkError);

    let err = provider
        .fetch_by_coordinates(Coordinates::new(48.85, 2.35), Unit::Metric)
        .await
        .unwrap_err();
    assert_eq!(err, WeatherError::NetworkError);

    assert!(provider.suggest_cities("paris", 5).await.is_empty());
}
