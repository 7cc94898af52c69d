//! HTTP client for the expense REST backend
//!
//! Implements the controller's collaborator traits over plain HTTP/1.1
//! (`hyper` client). Every response body is an `ApiResponse` envelope; the
//! status code decides how a failure is reported:
//! - 401 → `Unauthorized`
//! - 404 on a record → `NotFound`
//! - any other non-2xx → `Server` with the envelope's message
//! - undecodable body → `Protocol`

use async_trait::async_trait;
use expensedesk_config::Config;
use expensedesk_core::{
    AccountClient, ApiResponse, AuthToken, CollectionClient, CoreError, CoreResult, Credentials,
    Expense, ExpenseRequest, PageQuery, PageResult, User,
};
use hyper::client::HttpConnector;
use hyper::header::{ACCEPT, CONTENT_TYPE, COOKIE, SET_COOKIE};
use hyper::{Body, Client, HeaderMap, Method, Request, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const EXPENSES_PATH: &str = "/expenses";
const CURRENT_USER_PATH: &str = "/auth/me";
const LOGIN_PATH: &str = "/auth/login";
const LOGOUT_PATH: &str = "/auth/logout";
const SESSION_COOKIE: &str = "jwt";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Longest error body quoted in a `Server` error
const MAX_ERROR_BODY: usize = 200;

/// REST client for one backend
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client<HttpConnector>,
    /// `http://host:port/base-path`, no trailing slash
    api_root: String,
    /// `Cookie` header value; replaced by `login`, cleared by `logout`
    session_cookie: Arc<RwLock<Option<String>>>,
    timeout: Duration,
}

/// Status, headers and body of one exchange
struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl HttpClient {
    pub fn new(api_root: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_root: api_root.into().trim_end_matches('/').to_string(),
            session_cookie: Arc::new(RwLock::new(None)),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.api_root())
            .with_session_cookie(config.api.session_cookie.clone())
            .with_timeout(Duration::from_secs(config.api.request_timeout_secs))
    }

    /// Raw `Cookie` header value sent with every request
    pub fn with_session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = Arc::new(RwLock::new(cookie));
        self
    }

    /// Cookie header value currently sent
    pub async fn session_cookie(&self) -> Option<String> {
        self.session_cookie.read().await.clone()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    fn url(&self, path: &str, params: &[(&'static str, String)]) -> String {
        let mut url = format!("{}{}", self.api_root, path);
        if !params.is_empty() {
            let query: Vec<String> = params
                .iter()
                .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }

    /// One request/response exchange, bounded by the timeout
    ///
    /// `body` is the content type and the encoded payload.
    async fn send(
        &self,
        method: Method,
        url: String,
        body: Option<(&'static str, Vec<u8>)>,
    ) -> CoreResult<Reply> {
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(&url)
            .header(ACCEPT, "application/json");
        if let Some(cookie) = self.session_cookie.read().await.as_deref() {
            builder = builder.header(COOKIE, cookie);
        }
        let request = match body {
            Some((content_type, bytes)) => builder
                .header(CONTENT_TYPE, content_type)
                .body(Body::from(bytes)),
            None => builder.body(Body::empty()),
        }
        .map_err(|e| CoreError::Transport {
            message: format!("Invalid request to {}: {}", url, e),
        })?;

        log::debug!("{} {}", method, url);
        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let headers = response.headers().clone();
            let bytes = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, hyper::Error>(Reply {
                status,
                headers,
                body: bytes.to_vec(),
            })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(reply)) => {
                log::debug!("{} {} -> {}", method, url, reply.status);
                Ok(reply)
            }
            Ok(Err(e)) => Err(CoreError::Transport {
                message: e.to_string(),
            }),
            Err(_) => Err(CoreError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }

    /// Send and unwrap the envelope's `data`
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<(&'static str, Vec<u8>)>,
    ) -> CoreResult<T> {
        let reply = self.send(method, url, body).await?;
        check_status(reply.status, &reply.body)?;
        unwrap_data(&reply.body)
    }
}

fn unwrap_data<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    let envelope: ApiResponse<T> = decode(bytes)?;
    envelope.data.ok_or_else(|| CoreError::Protocol {
        message: format!("response without data: {}", envelope.message),
    })
}

/// `jwt=<token>` from a `Set-Cookie` header, if the response sets a non-empty one
fn issued_session(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, token)| *name == SESSION_COOKIE && !token.is_empty())
        .map(|(name, token)| format!("{}={}", name, token))
}

fn json_body<T: serde::Serialize>(value: &T) -> CoreResult<Option<(&'static str, Vec<u8>)>> {
    Ok(Some(("application/json", encode(value)?)))
}

fn encode<T: serde::Serialize>(value: &T) -> CoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| CoreError::Protocol {
        message: format!("cannot encode request: {}", e),
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::Protocol {
        message: format!("cannot decode response: {}", e),
    })
}

/// Map a non-2xx status to an error
fn check_status(status: StatusCode, bytes: &[u8]) -> CoreResult<()> {
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(CoreError::Unauthorized);
    }
    let message = match serde_json::from_slice::<ApiResponse<serde_json::Value>>(bytes) {
        Ok(envelope) => envelope.message,
        Err(_) => {
            let text = String::from_utf8_lossy(bytes);
            let text = text.trim();
            if text.is_empty() {
                status.canonical_reason().unwrap_or("no reason").to_string()
            } else {
                text.chars().take(MAX_ERROR_BODY).collect()
            }
        }
    };
    Err(CoreError::Server {
        status: status.as_u16(),
        message,
    })
}

/// 404 on a record URL means the record is gone
fn record_error(id: i64) -> impl Fn(CoreError) -> CoreError {
    move |error| match error {
        CoreError::Server { status: 404, .. } => CoreError::NotFound { id },
        other => other,
    }
}

/// Page shape metadata when the backend nests it under `page`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageMetadata {
    size: u32,
    number: u32,
    total_elements: u64,
    total_pages: u32,
}

/// Both page shapes a Spring backend may produce
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PageEnvelope<R> {
    Flat(PageResult<R>),
    Nested { content: Vec<R>, page: PageMetadata },
}

impl<R> From<PageEnvelope<R>> for PageResult<R> {
    fn from(envelope: PageEnvelope<R>) -> Self {
        match envelope {
            PageEnvelope::Flat(page) => page,
            PageEnvelope::Nested { content, page } => PageResult {
                rows: content,
                total_elements: page.total_elements,
                total_pages: page.total_pages,
                size: page.size,
                number: page.number,
            },
        }
    }
}

#[async_trait]
impl CollectionClient for HttpClient {
    type Record = Expense;
    type Draft = ExpenseRequest;

    async fn fetch(&self, query: &PageQuery) -> CoreResult<PageResult<Expense>> {
        let url = self.url(EXPENSES_PATH, &query.request_params());
        let page: PageEnvelope<Expense> = self.call(Method::GET, url, None).await?;
        Ok(page.into())
    }

    async fn get(&self, id: i64) -> CoreResult<Expense> {
        let url = self.url(&format!("{}/{}", EXPENSES_PATH, id), &[]);
        self.call(Method::GET, url, None).await.map_err(record_error(id))
    }

    async fn create(&self, draft: &ExpenseRequest) -> CoreResult<Expense> {
        let url = self.url(EXPENSES_PATH, &[]);
        self.call(Method::POST, url, json_body(draft)?).await
    }

    async fn update(&self, id: i64, draft: &ExpenseRequest) -> CoreResult<Expense> {
        let url = self.url(&format!("{}/{}", EXPENSES_PATH, id), &[]);
        self.call(Method::PUT, url, json_body(draft)?)
            .await
            .map_err(record_error(id))
    }

    /// 204 with or without a body
    async fn delete(&self, id: i64) -> CoreResult<()> {
        let url = self.url(&format!("{}/{}", EXPENSES_PATH, id), &[]);
        let reply = self.send(Method::DELETE, url, None).await?;
        check_status(reply.status, &reply.body).map_err(record_error(id))
    }
}

#[async_trait]
impl AccountClient for HttpClient {
    /// Form-encoded login; the issued `jwt` cookie is sent from then on
    async fn login(&self, credentials: &Credentials) -> CoreResult<()> {
        let form = format!(
            "username={}&password={}",
            urlencoding::encode(&credentials.username),
            urlencoding::encode(&credentials.password)
        );
        let url = self.url(LOGIN_PATH, &[]);
        let reply = self
            .send(Method::POST, url, Some((FORM_CONTENT_TYPE, form.into_bytes())))
            .await?;
        check_status(reply.status, &reply.body)?;

        let cookie = match issued_session(&reply.headers) {
            Some(cookie) => cookie,
            None => {
                let token: AuthToken = unwrap_data(&reply.body)?;
                format!("{}={}", SESSION_COOKIE, token.access_token)
            }
        };
        *self.session_cookie.write().await = Some(cookie);
        log::info!("Logged in as {}", credentials.username);
        Ok(())
    }

    /// The cookie is forgotten even when the backend call fails
    async fn logout(&self) -> CoreResult<()> {
        let url = self.url(LOGOUT_PATH, &[]);
        let result = self.send(Method::POST, url, None).await;
        *self.session_cookie.write().await = None;
        let reply = result?;
        check_status(reply.status, &reply.body)
    }

    async fn current_user(&self) -> CoreResult<User> {
        let url = self.url(CURRENT_USER_PATH, &[]);
        self.call(Method::GET, url, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use expensedesk_api::AppState;
    use expensedesk_core::{
        CollectionController, ControllerOptions, Operator, Session, SortDirection, SortSpec,
        TableUpdate, EXPENSE_COLUMNS,
    };
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// Start the development backend on an ephemeral port; returns its API root
    async fn start_backend(token: Option<&str>) -> String {
        let mut config = Config::default();
        config.server.session_token = token.map(str::to_string);
        let base_path = config.api.base_path.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(expensedesk_api::serve(listener, AppState::new(config)));
        format!("http://{}{}", addr, base_path)
    }

    fn draft(title: &str) -> ExpenseRequest {
        ExpenseRequest {
            title: title.to_string(),
            category: "Food".to_string(),
            amount: Decimal::new(4_050, 2),
            date: Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
            description: "with biscuits".to_string(),
        }
    }

    #[test]
    fn test_url_encoding() {
        let client = HttpClient::new("http://127.0.0.1:8080/api/expense-tracker/");
        let query = PageQuery::new(1, 5).with_filter(Some("title=='a&b'".to_string()));
        assert_eq!(
            client.url(EXPENSES_PATH, &query.request_params()),
            "http://127.0.0.1:8080/api/expense-tracker/expenses?page=1&size=5&filter=title%3D%3D%27a%26b%27"
        );
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(StatusCode::NO_CONTENT, b"").is_ok());
        assert_eq!(check_status(StatusCode::UNAUTHORIZED, b""), Err(CoreError::Unauthorized));
        assert_eq!(
            check_status(
                StatusCode::BAD_REQUEST,
                br#"{"statusCode":400,"message":"Bad request: nope"}"#
            ),
            Err(CoreError::Server {
                status: 400,
                message: "Bad request: nope".to_string()
            })
        );
        assert_eq!(
            check_status(StatusCode::BAD_GATEWAY, b""),
            Err(CoreError::Server {
                status: 502,
                message: "Bad Gateway".to_string()
            })
        );
    }

    #[test]
    fn test_nested_page_shape() {
        let json = r#"{"content":[],"page":{"size":5,"number":2,"totalElements":11,"totalPages":3}}"#;
        let page: PageResult<Expense> = decode::<PageEnvelope<Expense>>(json.as_bytes()).unwrap().into();
        assert_eq!(page.number, 2);
        assert_eq!(page.total_pages, 3);

        let json = r#"{"content":[],"totalElements":0,"totalPages":0,"size":5,"number":0}"#;
        let page: PageResult<Expense> = decode::<PageEnvelope<Expense>>(json.as_bytes()).unwrap().into();
        assert_eq!(page.size, 5);
    }

    #[tokio::test]
    async fn test_fetch_filtered_sorted_page() {
        let client = HttpClient::new(start_backend(None).await);
        let query = PageQuery::new(0, 2)
            .with_sort(Some(SortSpec::new("amount", SortDirection::Ascending)))
            .with_filter(Some("category=ilike='%travel%'".to_string()));
        let page = client.fetch(&query).await.unwrap();
        assert_eq!(page.total_elements, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.rows[0].title, "Metro card");
        assert_eq!(page.number, 0);
    }

    #[tokio::test]
    async fn test_crud_over_http() {
        let client = HttpClient::new(start_backend(None).await);

        let created = client.create(&draft("Tea")).await.unwrap();
        assert_eq!(created.title, "Tea");
        assert_eq!(created.description.as_deref(), Some("with biscuits"));

        let updated = client.update(created.id, &draft("Chai")).await.unwrap();
        assert_eq!(updated.title, "Chai");
        assert_eq!(client.get(created.id).await.unwrap().title, "Chai");

        client.delete(created.id).await.unwrap();
        assert_eq!(
            client.get(created.id).await,
            Err(CoreError::NotFound { id: created.id })
        );
        assert_eq!(
            client.delete(created.id).await,
            Err(CoreError::NotFound { id: created.id })
        );
    }

    #[tokio::test]
    async fn test_bad_filter_is_server_error() {
        let client = HttpClient::new(start_backend(None).await);
        let query = PageQuery::new(0, 5).with_filter(Some("amount>'lots'".to_string()));
        assert!(matches!(
            client.fetch(&query).await,
            Err(CoreError::Server { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_session_cookie() {
        let root = start_backend(Some("letmein")).await;

        let anonymous = HttpClient::new(root.clone());
        assert_eq!(Session::open(&anonymous).await, Err(CoreError::Unauthorized));
        assert_eq!(
            anonymous.fetch(&PageQuery::new(0, 5)).await,
            Err(CoreError::Unauthorized)
        );

        let signed_in = HttpClient::new(root).with_session_cookie(Some("jwt=letmein".to_string()));
        let session = Session::open(&signed_in).await.unwrap();
        assert_eq!(session.user().unwrap().username, "demo");
    }

    fn demo_credentials(password: &str) -> Credentials {
        Credentials {
            username: "demo".to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let client = HttpClient::new(start_backend(Some("letmein")).await);
        assert_eq!(
            client.login(&demo_credentials("guess")).await,
            Err(CoreError::Unauthorized)
        );
        assert_eq!(client.session_cookie().await, None);
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let client = HttpClient::new(start_backend(Some("letmein")).await);

        let mut session = Session::login(&client, &demo_credentials("demo")).await.unwrap();
        assert_eq!(session.user().unwrap().username, "demo");
        let cookie = client.session_cookie().await.unwrap();
        assert!(cookie.starts_with("jwt="), "{}", cookie);
        assert_ne!(cookie, "jwt=letmein");
        assert_eq!(client.fetch(&PageQuery::new(0, 5)).await.unwrap().rows.len(), 5);

        session.logout(&client).await.unwrap();
        assert!(!session.is_open());
        assert_eq!(client.session_cookie().await, None);
        assert_eq!(
            client.fetch(&PageQuery::new(0, 5)).await,
            Err(CoreError::Unauthorized)
        );

        // The old token was revoked on the backend too
        let replay = HttpClient::new(client.api_root().to_string()).with_session_cookie(Some(cookie));
        assert_eq!(replay.current_user().await, Err(CoreError::Unauthorized));
    }

    #[test]
    fn test_issued_session_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(issued_session(&headers), None);
        headers.append(SET_COOKIE, "theme=dark; Path=/".parse().unwrap());
        headers.append(SET_COOKIE, "jwt=1.2.3; Path=/; HttpOnly".parse().unwrap());
        assert_eq!(issued_session(&headers).as_deref(), Some("jwt=1.2.3"));

        let mut cleared = HeaderMap::new();
        cleared.append(SET_COOKIE, "jwt=; Path=/; Max-Age=0".parse().unwrap());
        assert_eq!(issued_session(&cleared), None);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new(format!("http://{}/api", addr));
        let result = client.fetch(&PageQuery::new(0, 5)).await;
        assert!(matches!(result, Err(CoreError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_controller_against_backend() {
        let client = Arc::new(HttpClient::new(start_backend(None).await));
        let options = ControllerOptions {
            debounce: Duration::from_millis(20),
            ..ControllerOptions::default()
        };
        let mut controller =
            CollectionController::mount(client, EXPENSE_COLUMNS, options, "sort=amount,desc").unwrap();
        controller.settle().await;
        assert_eq!(controller.rows().len(), 5);
        assert_eq!(controller.rows()[0].title, "Rent");

        controller
            .edit_filter("category", Some(Operator::ILike), Some("food"))
            .unwrap();
        let updates = controller.settle().await;
        assert!(matches!(updates[0], TableUpdate::FilterCommitted { .. }));
        assert_eq!(controller.page_result().total_elements, 4);
        assert_eq!(
            controller.location(),
            "/expenses?sort=amount%2Cdesc&filter=category%3Dilike%3D%27%25food%25%27"
        );
    }
}
