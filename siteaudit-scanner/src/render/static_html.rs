use super::PageRenderer;
use crate::error::{Result, ScanError};
use crate::extract::extract_page;
use crate::result::PageExtract;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Fetches raw HTML and extracts from it without running scripts. Suitable
/// for sites that render server-side.
pub struct StaticHtmlRenderer {
    client: Client,
}

impl StaticHtmlRenderer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageRenderer for StaticHtmlRenderer {
    async fn render_page(&self, url: &str, timeout: Duration) -> Result<PageExtract> {
        debug!("Fetching {} without script execution", url);
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ScanError::render(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::render(url, format!("HTTP {}", status)));
        }

        let html = response.text().await.map_err(|e| ScanError::render(url, e))?;
        Ok(extract_page(url, &html, None))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    #[tokio::test]
    async fn test_static_render_extracts_page() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rooms"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(
                        r#"<html><head><title>Rooms</title><meta name="description" content="Our rooms"></head>
                        <body><p>Double room</p><a href="/book">Book</a></body></html>"#,
                    ),
            )
            .mount(&mock_server)
            .await;

        let renderer = StaticHtmlRenderer::new(build_client(Duration::from_secs(5), true).unwrap());
        let url = format!("{}/rooms", mock_server.uri());
        let page = renderer
            .render_page(&url, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(page.title, "Rooms");
        assert_eq!(page.description, "Our rooms");
        assert_eq!(page.normalized_body_text, "double room book");
        assert_eq!(
            page.outbound_links,
            vec![format!("{}/book", mock_server.uri())]
        );
    }

    #[tokio::test]
    async fn test_static_render_http_error_is_render_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let renderer = StaticHtmlRenderer::new(build_client(Duration::from_secs(5), true).unwrap());
        let err = renderer
            .render_page(&format!("{}/gone", mock_server.uri()), Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::RenderError { .. }));
        assert!(err.to_string().contains("404"));
    }
}
