//! Integration test harness for the Emporium storefront client.
//!
//! [`FakeBackend`] is an in-process axum server speaking the storefront REST
//! API: envelope responses, bearer access tokens, a `jwt` refresh cookie and
//! a configurable "access token expired" status. Tests script its behavior
//! (expire the current token, reject or break refresh, fail logout) and read
//! per-endpoint hit counters to assert exactly which calls were made.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p emporium-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `session_lifecycle` - bootstrap, login, logout, route guard
//! - `request_pipeline` - refresh-and-retry, coalescing, search cancellation
//! - `account` - cart, wishlist, addresses, reviews, checkout

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};

use emporium_storefront::auth::LoginForm;
use emporium_storefront::session::{CookieJar, LoginFlag, MemoryLoginFlag};
use emporium_storefront::{Storefront, StorefrontConfig};

/// Path prefix of the fake API.
pub const API_PREFIX: &str = "/api/v1/";

/// Password the fake accepts for every user.
pub const PASSWORD: &str = "correct-horse";

/// Status the fake uses for "access token expired".
pub const EXPIRED_STATUS: StatusCode = StatusCode::FORBIDDEN;

/// How `GET refresh` behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Issue a new valid access token.
    Rotate,
    /// 401: the durable credential is invalid.
    Reject,
    /// 500: the backend is broken.
    Fail,
    /// Issue a token that protected endpoints still reject as expired.
    StillExpired,
}

/// A cart line as the fake stores it.
#[derive(Debug, Clone)]
struct CartLine {
    id: String,
    product_id: String,
    quantity: u32,
}

#[derive(Debug)]
struct UserRecord {
    username: String,
    email: String,
    phone: Option<String>,
    gender: Option<String>,
    avatar: Option<String>,
    wishlist: Vec<String>,
    cart: Vec<CartLine>,
    addresses: Vec<Value>,
}

impl Default for UserRecord {
    fn default() -> Self {
        Self {
            username: "asha".to_string(),
            email: "asha@shop.in".to_string(),
            phone: Some("9876543210".to_string()),
            gender: Some("female".to_string()),
            avatar: None,
            wishlist: vec!["p2".to_string()],
            cart: vec![CartLine {
                id: "c1".to_string(),
                product_id: "p1".to_string(),
                quantity: 2,
            }],
            addresses: vec![json!({
                "_id": "a1",
                "name": "Asha",
                "phone": 9_876_543_210_u64,
                "pincode": 560_001,
                "locality": "Indiranagar",
                "address": "1 CMH Road",
                "city": "Bengaluru",
                "state": "Karnataka",
                "addressType": "home"
            })],
        }
    }
}

impl UserRecord {
    fn cart_json(&self) -> Vec<Value> {
        self.cart
            .iter()
            .map(|l| json!({"_id": l.id, "productId": l.product_id, "quantity": l.quantity}))
            .collect()
    }

    fn to_json(&self) -> Value {
        json!({
            "_id": "u1",
            "username": self.username,
            "email": self.email,
            "phone": self.phone,
            "gender": self.gender,
            "avatar": self.avatar,
            "wishlistIds": self.wishlist,
            "cart": self.cart_json(),
            "shippingAddresses": self.addresses,
        })
    }
}

#[derive(Debug)]
struct BackendState {
    hits: Mutex<HashMap<String, usize>>,
    token_seq: AtomicU64,
    valid_token: Mutex<Option<String>>,
    refresh_cookie: Mutex<Option<String>>,
    refresh_mode: Mutex<RefreshMode>,
    refresh_delay: Mutex<Duration>,
    fail_logout: AtomicBool,
    user: Mutex<UserRecord>,
}

/// In-process fake of the storefront REST API.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    state: Arc<BackendState>,
    addr: SocketAddr,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn ok(message: &str, data: Value) -> Response {
    Json(json!({"success": true, "message": message, "data": data})).into_response()
}

fn fail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"success": false, "message": message}))).into_response()
}

/// Product document for `id`, or `None` for unknown IDs.
#[must_use]
pub fn product_json(id: &str) -> Option<Value> {
    let (title, price, discount, stock) = match id {
        "p1" => ("Linen Shirt", 2000, 10, 25),
        "p2" => ("Denim Jacket", 4500, 0, 3),
        "p3" => ("Canvas Tote", 800, 20, 0),
        _ => return None,
    };
    Some(json!({
        "_id": id,
        "title": title,
        "description": format!("{title} from the spring collection"),
        "price": price,
        "discount": discount,
        "stock": stock,
        "images": [{"_id": format!("{id}-img"), "url": format!("https://cdn.shop.in/{id}.jpg")}],
        "reviews": [],
        "featured": id == "p1"
    }))
}

impl FakeBackend {
    /// Start the fake on an ephemeral localhost port.
    ///
    /// # Panics
    ///
    /// Panics if no port can be bound.
    pub async fn start() -> Self {
        let state = Arc::new(BackendState {
            hits: Mutex::new(HashMap::new()),
            token_seq: AtomicU64::new(0),
            valid_token: Mutex::new(None),
            refresh_cookie: Mutex::new(None),
            refresh_mode: Mutex::new(RefreshMode::Rotate),
            refresh_delay: Mutex::new(Duration::ZERO),
            fail_logout: AtomicBool::new(false),
            user: Mutex::new(UserRecord::default()),
        });

        #[allow(clippy::expect_used)]
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake backend");
        #[allow(clippy::expect_used)]
        let addr = listener.local_addr().expect("fake backend address");

        let backend = Self { state, addr };
        let app = backend.router();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        backend
    }

    fn router(&self) -> Router {
        let api = Router::new()
            // Auth
            .route("/login", post(login))
            .route("/register", post(register))
            .route("/refresh", get(refresh))
            .route("/logout", post(logout))
            .route("/password/forgot", post(forgot_password))
            // Public catalog
            .route("/products/{id}", get(product))
            .route("/category/parent/public", get(parent_categories))
            .route("/category/child/public/{id}", get(child_categories))
            .route("/filteredProducts", get(filtered_products))
            // Protected
            .route("/products/cart", get(cart))
            .route("/products/wishlist", get(wishlist))
            .route("/user/cart/{id}", post(set_quantity).delete(remove_from_cart))
            .route("/user/wishlist/{id}", post(toggle_wishlist))
            .route("/user/shippingAddress/new", post(add_address))
            .route("/user/shippingAddress/delete/{id}", delete(delete_address))
            .route("/myProfile/update", put(update_profile))
            .route("/product/review/{id}", post(review))
            .route("/create-checkout-session", post(checkout));

        Router::new()
            .nest(API_PREFIX.trim_end_matches('/'), api)
            .layer(middleware::from_fn_with_state(self.clone(), count_hits))
            .with_state(self.clone())
    }

    /// Base URL to configure the client with.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}{API_PREFIX}", self.addr)
    }

    /// Client configuration pointing at this backend.
    ///
    /// # Panics
    ///
    /// Panics if the backend URL does not parse.
    #[must_use]
    pub fn config(&self) -> StorefrontConfig {
        #[allow(clippy::expect_used)]
        let mut config = StorefrontConfig::new(self.base_url().parse().expect("fake backend URL"));
        config.auth_expired_status = EXPIRED_STATUS;
        config.request_timeout = Duration::from_secs(5);
        config
    }

    /// Number of requests received for `"<METHOD> <path>"`, e.g. `"GET refresh"`.
    #[must_use]
    pub fn hits(&self, endpoint: &str) -> usize {
        lock(&self.state.hits).get(endpoint).copied().unwrap_or(0)
    }

    /// Total number of requests received.
    #[must_use]
    pub fn total_hits(&self) -> usize {
        lock(&self.state.hits).values().sum()
    }

    /// Forget all hit counts.
    pub fn reset_hits(&self) {
        lock(&self.state.hits).clear();
    }

    /// Make the current access token expired.
    pub fn expire_access_token(&self) {
        *lock(&self.state.valid_token) = None;
    }

    /// Change how `GET refresh` behaves.
    pub fn set_refresh_mode(&self, mode: RefreshMode) {
        *lock(&self.state.refresh_mode) = mode;
    }

    /// Delay every refresh response.
    pub fn set_refresh_delay(&self, delay: Duration) {
        *lock(&self.state.refresh_delay) = delay;
    }

    /// Make `POST logout` fail with a 500.
    pub fn fail_logout(&self, fail: bool) {
        self.state.fail_logout.store(fail, Ordering::SeqCst);
    }

    /// Set the quantity of the cart line for `product`, adding it if missing.
    pub fn seed_cart(&self, product: &str, quantity: u32) {
        let mut user = lock(&self.state.user);
        let next_id = format!("c{}", user.cart.len() + 1);
        match user.cart.iter_mut().find(|l| l.product_id == product) {
            Some(line) => line.quantity = quantity,
            None => user.cart.push(CartLine {
                id: next_id,
                product_id: product.to_string(),
                quantity,
            }),
        }
    }

    /// Empty the server-side cart.
    pub fn clear_cart(&self) {
        lock(&self.state.user).cart.clear();
    }

    fn record(&self, endpoint: String) {
        *lock(&self.state.hits).entry(endpoint).or_insert(0) += 1;
    }

    fn issue_tokens(&self) -> (String, String) {
        let n = self.state.token_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{n}");
        let refresh = format!("refresh-{n}");
        *lock(&self.state.valid_token) = Some(access.clone());
        *lock(&self.state.refresh_cookie) = Some(refresh.clone());
        (access, refresh)
    }

    /// Login-style response with a fresh token pair and refresh cookie.
    fn session_response(&self, message: &str) -> Response {
        let (access, refresh) = self.issue_tokens();
        let user = lock(&self.state.user).to_json();
        let cookie = format!("jwt={refresh}; Path=/; HttpOnly");
        (
            [(header::SET_COOKIE, cookie)],
            Json(json!({
                "success": true,
                "message": message,
                "data": {"user": user, "accessToken": access}
            })),
        )
            .into_response()
    }

    /// 401 without a bearer token, expired status for a stale one.
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let Some(value) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Err(fail(StatusCode::UNAUTHORIZED, "Please login to continue"));
        };
        let token = value.strip_prefix("Bearer ").unwrap_or_default();
        if lock(&self.state.valid_token).as_deref() == Some(token) {
            Ok(())
        } else {
            Err(fail(EXPIRED_STATUS, "Access token expired"))
        }
    }

    fn has_refresh_cookie(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = lock(&self.state.refresh_cookie).clone() else {
            return false;
        };
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .any(|pair| pair.trim() == format!("jwt={expected}"))
    }

    fn user_response(&self, message: &str) -> Response {
        let user = lock(&self.state.user).to_json();
        ok(message, json!({"user": user}))
    }
}

async fn count_hits(State(backend): State<FakeBackend>, request: Request, next: Next) -> Response {
    let path = request
        .uri()
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or_else(|| request.uri().path())
        .to_string();
    backend.record(format!("{} {path}", request.method()));
    next.run(request).await
}

// =============================================================================
// Auth
// =============================================================================

async fn login(State(backend): State<FakeBackend>, Json(body): Json<Value>) -> Response {
    let user = body["usernameOrEmail"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    let known = {
        let record = lock(&backend.state.user);
        user == record.username || user == record.email
    };
    if !known || password != PASSWORD {
        return fail(StatusCode::BAD_REQUEST, "Invalid credentials");
    }
    backend.session_response("Logged in successfully")
}

async fn register(State(backend): State<FakeBackend>, Json(body): Json<Value>) -> Response {
    if body["password"].as_str().unwrap_or_default().len() < 8 {
        return fail(StatusCode::BAD_REQUEST, "Password must be at least 8 characters");
    }
    {
        let mut user = lock(&backend.state.user);
        *user = UserRecord {
            username: body["username"].as_str().unwrap_or_default().to_string(),
            email: body["email"].as_str().unwrap_or_default().to_string(),
            phone: None,
            gender: None,
            wishlist: Vec::new(),
            cart: Vec::new(),
            addresses: Vec::new(),
            avatar: None,
        };
    }
    backend.session_response("Registered successfully")
}

async fn refresh(State(backend): State<FakeBackend>, headers: HeaderMap) -> Response {
    let delay = *lock(&backend.state.refresh_delay);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let mode = *lock(&backend.state.refresh_mode);
    match mode {
        RefreshMode::Reject => fail(StatusCode::UNAUTHORIZED, "Session expired"),
        RefreshMode::Fail => fail(StatusCode::INTERNAL_SERVER_ERROR, "Database unavailable"),
        _ if !backend.has_refresh_cookie(&headers) => {
            fail(StatusCode::UNAUTHORIZED, "No refresh token")
        }
        RefreshMode::Rotate => backend.session_response("Token refreshed"),
        RefreshMode::StillExpired => {
            let response = backend.session_response("Token refreshed");
            backend.expire_access_token();
            response
        }
    }
}

async fn logout(State(backend): State<FakeBackend>, headers: HeaderMap) -> Response {
    if backend.state.fail_logout.load(Ordering::SeqCst) {
        return fail(StatusCode::INTERNAL_SERVER_ERROR, "Logout failed");
    }
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    *lock(&backend.state.valid_token) = None;
    *lock(&backend.state.refresh_cookie) = None;
    (
        [(header::SET_COOKIE, "jwt=; Path=/; Max-Age=0")],
        Json(json!({"success": true, "message": "Logged out successfully", "data": null})),
    )
        .into_response()
}

async fn forgot_password(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    ok(&format!("Reset link sent to {email}"), Value::Null)
}

// =============================================================================
// Public catalog
// =============================================================================

async fn product(Path(id): Path<String>) -> Response {
    product_json(&id).map_or_else(
        || fail(StatusCode::NOT_FOUND, "Product not found"),
        |p| ok("Product fetched", json!({"product": p})),
    )
}

async fn parent_categories() -> Response {
    ok(
        "Categories fetched",
        json!({"parentCategories": [
            {"_id": "men", "name": "Men"},
            {"_id": "women", "name": "Women"}
        ]}),
    )
}

async fn child_categories(Path(id): Path<String>) -> Response {
    let children = match id.as_str() {
        "men" => json!([{"_id": "shirts", "name": "Shirts", "parentCategory": "men"}]),
        "women" => json!([{"_id": "bags", "name": "Bags", "parentCategory": {"_id": "women", "name": "Women"}}]),
        _ => json!([]),
    };
    ok("Categories fetched", json!({"childCategories": children}))
}

async fn filtered_products(Query(query): Query<HashMap<String, String>>) -> Response {
    let search = query.get("search").map(String::as_str).unwrap_or_default();
    if search == "slow" {
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    let products: Vec<Value> = ["p1", "p2", "p3"]
        .into_iter()
        .filter_map(product_json)
        .filter(|p| {
            search.is_empty()
                || search == "slow"
                || p["title"]
                    .as_str()
                    .is_some_and(|t| t.to_lowercase().contains(&search.to_lowercase()))
        })
        .collect();
    ok(
        "Products fetched",
        json!({"filteredProducts": products, "brands": ["Acme", "Loom"]}),
    )
}

// =============================================================================
// Protected
// =============================================================================

async fn cart(State(backend): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    let lines: Vec<Value> = lock(&backend.state.user)
        .cart
        .iter()
        .filter_map(|l| {
            product_json(&l.product_id)
                .map(|p| json!({"_id": l.id, "productId": p, "quantity": l.quantity}))
        })
        .collect();
    ok("Cart fetched", json!({"cart": lines}))
}

async fn wishlist(State(backend): State<FakeBackend>, headers: HeaderMap) -> Response {
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    let products: Vec<Value> = lock(&backend.state.user)
        .wishlist
        .iter()
        .filter_map(|id| product_json(id))
        .collect();
    ok("Wishlist fetched", json!({"wishlistProducts": products}))
}

async fn set_quantity(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    let mut quantity = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("quantity") {
            quantity = field.text().await.ok().and_then(|q| q.parse::<u32>().ok());
        }
    }
    let Some(quantity) = quantity.filter(|q| (1..=6).contains(q)) else {
        return fail(StatusCode::BAD_REQUEST, "Quantity must be between 1 and 6");
    };
    backend.seed_cart(&id, quantity);
    backend.user_response("Cart updated")
}

async fn remove_from_cart(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    lock(&backend.state.user).cart.retain(|l| l.product_id != id);
    backend.user_response("Removed from cart")
}

async fn toggle_wishlist(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    {
        let mut user = lock(&backend.state.user);
        if user.wishlist.contains(&id) {
            user.wishlist.retain(|p| p != &id);
        } else {
            user.wishlist.push(id);
        }
    }
    backend.user_response("Wishlist updated")
}

async fn add_address(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    {
        let mut user = lock(&backend.state.user);
        body["_id"] = json!(format!("a{}", user.addresses.len() + 1));
        user.addresses.push(body);
    }
    backend.user_response("Address added")
}

async fn delete_address(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    lock(&backend.state.user)
        .addresses
        .retain(|a| a["_id"].as_str() != Some(id.as_str()));
    backend.user_response("Address deleted")
}

async fn update_profile(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    {
        let mut user = lock(&backend.state.user);
        user.username = body["username"].as_str().unwrap_or_default().to_string();
        user.email = body["email"].as_str().unwrap_or_default().to_string();
        user.phone = body["phone"].as_str().map(str::to_string);
        user.gender = body["gender"].as_str().map(str::to_string);
    }
    backend.user_response("Profile updated")
}

async fn review(
    State(backend): State<FakeBackend>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    if product_json(&id).is_none() {
        return fail(StatusCode::NOT_FOUND, "Product not found");
    }
    let rating = body["numRating"].as_u64().unwrap_or_default();
    ok(&format!("Thanks for rating {rating} stars"), Value::Null)
}

async fn checkout(
    State(backend): State<FakeBackend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = backend.authorize(&headers) {
        return rejection;
    }
    if body["selectedAddress"]["_id"].as_str().is_none() || body["cart"].as_array().is_none_or(Vec::is_empty) {
        return fail(StatusCode::BAD_REQUEST, "Address and cart are required");
    }
    ok("Checkout session created", json!({"sessionId": "cs_test_123"}))
}

// =============================================================================
// Client side
// =============================================================================

/// A storefront client wired to a [`FakeBackend`].
///
/// The cookie jar and login flag outlive any one [`Storefront`], so
/// [`TestContext::reload`] behaves like reloading the page.
#[derive(Debug)]
pub struct TestContext {
    /// The fake server.
    pub backend: FakeBackend,
    /// The current page's storefront.
    pub storefront: Storefront,
    /// Durable cookie storage.
    pub jar: Arc<CookieJar>,
    /// Durable login flag.
    pub flag: Arc<MemoryLoginFlag>,
}

impl TestContext {
    /// Start a backend and a logged-out storefront with the flag unset.
    ///
    /// # Panics
    ///
    /// Panics if the client cannot be built.
    pub async fn new() -> Self {
        let backend = FakeBackend::start().await;
        let jar = Arc::new(CookieJar::in_memory());
        let flag = Arc::new(MemoryLoginFlag::default());
        let storefront = build_storefront(&backend, &jar, &flag);
        Self {
            backend,
            storefront,
            jar,
            flag,
        }
    }

    /// A fresh storefront sharing this context's cookies and login flag.
    #[must_use]
    pub fn reload(&self) -> Storefront {
        build_storefront(&self.backend, &self.jar, &self.flag)
    }

    /// Log in with the default user.
    ///
    /// # Panics
    ///
    /// Panics if login fails.
    pub async fn login(&self) {
        let result = self
            .storefront
            .auth()
            .login(&LoginForm {
                username_or_email: "asha".to_string(),
                password: SecretString::from(PASSWORD),
            })
            .await;
        assert!(result.is_ok(), "login failed: {result:?}");
    }

    /// Current value of the persistent login flag.
    #[must_use]
    pub fn flag(&self) -> bool {
        self.flag.get()
    }
}

fn build_storefront(backend: &FakeBackend, jar: &Arc<CookieJar>, flag: &Arc<MemoryLoginFlag>) -> Storefront {
    let config = backend.config();
    let login_flag: Arc<dyn LoginFlag> = flag.clone();
    #[allow(clippy::expect_used)]
    Storefront::builder(config)
        .cookie_jar(Arc::clone(jar))
        .login_flag(login_flag)
        .build()
        .expect("storefront client")
}
