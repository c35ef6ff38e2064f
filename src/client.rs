//! Typed HTTP client for the marketplace API.
//!
//! [`Session`] keeps the local view a front-end needs: who is logged in, what
//! is in their cart, and the last product page fetched. Cart mutations always
//! re-fetch the cart so the local copy mirrors the server.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    dto::{
        cart::AddToCartRequest,
        orders::{CreateOrderRequest, OrderWithItems},
        products::ProductPage,
        users::{LoginRequest, RegisterRequest},
    },
    models::{CartLine, Product, User},
    response::ApiResponse,
    routes::params::ProductQuery,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: StatusCode, message: String },

    #[error("response carried no data")]
    EmptyBody,
}

#[derive(Debug, Clone)]
pub struct ShoetradeClient {
    http: reqwest::Client,
    base_url: String,
}

impl ShoetradeClient {
    /// `base_url` is the server origin, e.g. `http://localhost:5000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, self.url(path))
    }

    pub async fn register(&self, payload: &RegisterRequest) -> Result<User, ClientError> {
        send(self.request(Method::POST, "/users/register").json(payload)).await
    }

    pub async fn login(&self, payload: &LoginRequest) -> Result<User, ClientError> {
        send(self.request(Method::POST, "/users/login").json(payload)).await
    }

    pub async fn cart(&self, user_id: Uuid) -> Result<Vec<CartLine>, ClientError> {
        send(self.request(Method::GET, &format!("/users/{user_id}/cart"))).await
    }

    pub async fn add_to_cart(
        &self,
        user_id: Uuid,
        payload: &AddToCartRequest,
    ) -> Result<Vec<CartLine>, ClientError> {
        send(
            self.request(Method::POST, &format!("/users/{user_id}/cart"))
                .json(payload),
        )
        .await
    }

    pub async fn remove_from_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<CartLine>, ClientError> {
        send(self.request(
            Method::DELETE,
            &format!("/users/{user_id}/cart/{product_id}"),
        ))
        .await
    }

    pub async fn clear_cart(&self, user_id: Uuid) -> Result<(), ClientError> {
        send::<serde_json::Value>(self.request(Method::DELETE, &format!("/users/{user_id}/cart")))
            .await
            .map(|_| ())
    }

    pub async fn products(&self, query: &ProductQuery) -> Result<ProductPage, ClientError> {
        send(self.request(Method::GET, "/products").query(query)).await
    }

    pub async fn create_order(&self, buyer_id: Uuid) -> Result<OrderWithItems, ClientError> {
        send(
            self.request(Method::POST, "/orders")
                .json(&CreateOrderRequest { buyer_id }),
        )
        .await
    }

    pub async fn pay_order(&self, order_id: Uuid) -> Result<OrderWithItems, ClientError> {
        send(self.request(Method::POST, &format!("/orders/{order_id}/pay"))).await
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        let body: ApiResponse<T> = response.json().await?;
        return body.data.ok_or(ClientError::EmptyBody);
    }

    let message = match response.json::<ApiResponse<serde_json::Value>>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    Err(ClientError::Api { status, message })
}

/// Local view of the signed-in user, their cart and the current product page.
#[derive(Debug)]
pub struct Session {
    client: ShoetradeClient,
    pub user: Option<User>,
    pub cart: Vec<CartLine>,
    pub products: Vec<Product>,
    pub last_error: Option<String>,
}

impl Session {
    pub fn new(client: ShoetradeClient) -> Self {
        Self {
            client,
            user: None,
            cart: Vec::new(),
            products: Vec::new(),
            last_error: None,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Total number of items across cart lines.
    pub fn cart_count(&self) -> i64 {
        self.cart
            .iter()
            .fold(0i64, |acc, line| acc.saturating_add(i64::from(line.quantity)))
    }

    /// Price of the cart; lines whose product could not be loaded count as zero.
    pub fn cart_total(&self) -> i64 {
        self.cart
            .iter()
            .filter_map(|line| {
                line.product
                    .as_ref()
                    .map(|p| p.price.saturating_mul(i64::from(line.quantity)))
            })
            .fold(0i64, i64::saturating_add)
    }

    pub async fn register(&mut self, payload: &RegisterRequest) -> Result<&User, ClientError> {
        let user = self.track(self.client.register(payload).await)?;
        Ok(self.user.insert(user))
    }

    pub async fn login(&mut self, payload: &LoginRequest) -> Result<&User, ClientError> {
        let user = self.track(self.client.login(payload).await)?;
        Ok(self.user.insert(user))
    }

    pub fn logout(&mut self) {
        self.user = None;
        self.cart.clear();
    }

    pub async fn fetch_cart(&mut self) -> Result<(), ClientError> {
        let Some(user_id) = self.user_id() else {
            return Ok(());
        };
        self.cart = self.track(self.client.cart(user_id).await)?;
        Ok(())
    }

    pub async fn add_to_cart(&mut self, product_id: Uuid, quantity: i32) -> Result<(), ClientError> {
        let Some(user_id) = self.user_id() else {
            return Ok(());
        };
        let payload = AddToCartRequest {
            product_id,
            quantity,
        };
        self.track(self.client.add_to_cart(user_id, &payload).await)?;
        self.fetch_cart().await
    }

    pub async fn remove_from_cart(&mut self, product_id: Uuid) -> Result<(), ClientError> {
        let Some(user_id) = self.user_id() else {
            return Ok(());
        };
        self.track(self.client.remove_from_cart(user_id, product_id).await)?;
        self.fetch_cart().await
    }

    pub async fn clear_cart(&mut self) -> Result<(), ClientError> {
        let Some(user_id) = self.user_id() else {
            return Ok(());
        };
        self.track(self.client.clear_cart(user_id).await)?;
        self.cart.clear();
        Ok(())
    }

    pub async fn fetch_products(
        &mut self,
        query: &ProductQuery,
    ) -> Result<ProductPage, ClientError> {
        let page = self.track(self.client.products(query).await)?;
        self.products = page.products.clone();
        Ok(page)
    }

    /// The server empties the cart as part of order creation.
    pub async fn create_order(&mut self) -> Result<Option<OrderWithItems>, ClientError> {
        let Some(user_id) = self.user_id() else {
            return Ok(None);
        };
        let order = self.track(self.client.create_order(user_id).await)?;
        self.cart.clear();
        Ok(Some(order))
    }

    pub async fn pay_order(&mut self, order_id: Uuid) -> Result<OrderWithItems, ClientError> {
        self.track(self.client.pay_order(order_id).await)
    }

    fn user_id(&self) -> Option<Uuid> {
        self.user.as_ref().map(|u| u.id)
    }

    fn track<T>(&mut self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(err) => self.last_error = Some(err.to_string()),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn product(price: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Air Max 90".into(),
            brand: "Nike".into(),
            price,
            size: 42.0,
            description: String::new(),
            images: Vec::new(),
            seller_id: Uuid::new_v4(),
            verified: false,
            created_at: Utc::now(),
        }
    }

    fn line(price: Option<i64>, quantity: i32) -> CartLine {
        let product = price.map(product);
        CartLine {
            product_id: product.as_ref().map(|p| p.id).unwrap_or_else(Uuid::new_v4),
            quantity,
            product,
        }
    }

    #[test]
    fn cart_getters_sum_lines() {
        let mut session = Session::new(ShoetradeClient::new("http://localhost:5000"));
        assert!(!session.is_logged_in());
        assert_eq!(session.cart_count(), 0);
        assert_eq!(session.cart_total(), 0);

        session.cart = vec![line(Some(12000), 2), line(Some(500), 1), line(None, 3)];
        assert_eq!(session.cart_count(), 6);
        assert_eq!(session.cart_total(), 24500);
    }

    #[test]
    fn cart_total_saturates_instead_of_overflowing() {
        let mut session = Session::new(ShoetradeClient::new("http://localhost:5000"));
        session.cart = vec![line(Some(i64::MAX / 2), 3), line(Some(10), 1)];
        assert_eq!(session.cart_total(), i64::MAX);

        session.cart = vec![line(Some(1), i32::MAX), line(Some(1), i32::MAX)];
        assert_eq!(session.cart_count(), 2 * i64::from(i32::MAX));
    }

    #[test]
    fn logout_forgets_user_and_cart() {
        let mut session = Session::new(ShoetradeClient::new("http://localhost:5000"));
        session.user = Some(User {
            id: Uuid::new_v4(),
            username: "ferris".into(),
            email: "ferris@example.com".into(),
            created_at: Utc::now(),
        });
        session.cart = vec![line(Some(100), 1)];

        session.logout();
        assert!(!session.is_logged_in());
        assert!(session.cart.is_empty());
    }

    #[tokio::test]
    async fn logged_out_cart_actions_are_noops() {
        let mut session = Session::new(ShoetradeClient::new("http://127.0.0.1:9"));
        session.fetch_cart().await.expect("no request made");
        session.add_to_cart(Uuid::new_v4(), 1).await.expect("no request made");
        assert!(session.create_order().await.expect("no request made").is_none());
        assert!(session.last_error.is_none());
    }

    #[test]
    fn urls_are_rooted_at_api() {
        let client = ShoetradeClient::new("http://localhost:5000/");
        assert_eq!(client.url("/products"), "http://localhost:5000/api/products");
    }
}
