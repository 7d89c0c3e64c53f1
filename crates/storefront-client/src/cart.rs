//! Shopping cart operations
//!
//! Every cart endpoint answers with the full cart, so each operation returns a
//! fresh `Cart`. Calls go through a challenge-policy executor: a missing or
//! stale customer token surfaces as `AuthenticationRequired`, and the replayed
//! call's payload can be turned back into a `Cart` with `Cart::from_payload`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::call::Payload;
use crate::error::{RequestError, Result};
use crate::executor::RequestExecutor;

const CURRENT_CART_PATH: &str = "/carts/current";
const CART_PATH: &str = "/carts/";
const UPDATE_AMOUNT_PATH: &str = "/carts/update-amount";
const PRODUCT_LOOKUP_PATH: &str = "/products/by-external-code";

/// A line in the cart. Prices are in cents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: i64,
    pub product_name: String,
    pub amount: u32,
    pub price: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub cart_empty: bool,
    #[serde(default)]
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn from_payload(payload: Payload) -> Result<Self> {
        let value = payload
            .into_json()
            .ok_or_else(|| RequestError::Decode("cart response has no body".into()))?;
        let is_cart = value
            .as_object()
            .is_some_and(|object| object.contains_key("cart_empty") || object.contains_key("items"));
        if !is_cart {
            return Err(RequestError::Decode(
                "response has neither `cart_empty` nor `items`".into(),
            ));
        }
        serde_json::from_value(value).map_err(|e| RequestError::Decode(e.to_string()))
    }

    /// Total units across all lines; zero for a cart flagged empty.
    pub fn item_count(&self) -> u32 {
        if self.cart_empty {
            return 0;
        }
        self.items.iter().map(|item| item.amount).sum()
    }

    pub fn total_cents(&self) -> i64 {
        if self.cart_empty {
            return 0;
        }
        self.items
            .iter()
            .map(|item| item.price * i64::from(item.amount))
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

#[derive(Deserialize)]
struct ProductLookup {
    product_id: i64,
}

pub struct CartApi {
    executor: RequestExecutor,
}

impl CartApi {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub async fn load(&self) -> Result<Cart> {
        Cart::from_payload(self.executor.get(CURRENT_CART_PATH).await?)
    }

    /// Resolve a catalogue product by its external codes, then add it.
    ///
    /// Only the add step is replayed after a login challenge raised by it.
    pub async fn add_product(&self, product_code: &str, park_code: &str, amount: u32) -> Result<Cart> {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("product_code", product_code)
            .append_pair("park_code", park_code)
            .finish();
        let lookup = self
            .executor
            .get(&format!("{PRODUCT_LOOKUP_PATH}?{query}"))
            .await?
            .into_json()
            .ok_or_else(|| RequestError::Decode("product lookup returned no body".into()))?;
        let ProductLookup { product_id } =
            serde_json::from_value(lookup).map_err(|e| RequestError::Decode(e.to_string()))?;
        debug!(product_code, park_code, product_id, "product resolved");

        let payload = self
            .executor
            .post(
                CART_PATH,
                serde_json::json!({ "product_id": product_id, "amount": amount.max(1) }),
            )
            .await?;
        Cart::from_payload(payload)
    }

    /// Set a line's quantity. Amounts below one are raised to one; use
    /// `remove_item` to drop a line.
    pub async fn update_amount(&self, product_id: i64, amount: u32) -> Result<Cart> {
        let payload = self
            .executor
            .put(
                UPDATE_AMOUNT_PATH,
                serde_json::json!({ "product_id": product_id, "amount": amount.max(1) }),
            )
            .await?;
        Cart::from_payload(payload)
    }

    pub async fn remove_item(&self, product_id: i64) -> Result<Cart> {
        Cart::from_payload(self.executor.delete(&format!("/carts/{product_id}")).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{challenge_executor, spawn_server, start_mock_api, test_store};
    use axum::Json;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{delete, get, post, put};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Shop {
        items: Mutex<Vec<CartItem>>,
        lookups: Mutex<Vec<HashMap<String, String>>>,
    }

    impl Shop {
        fn cart(&self) -> Json<Cart> {
            let items = self.items.lock().unwrap().clone();
            Json(Cart {
                cart_empty: items.is_empty(),
                items,
            })
        }
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("customer-authorization")
            .is_some_and(|v| v == "Bearer cust")
    }

    async fn start_shop() -> (String, Arc<Shop>) {
        let shop = Arc::new(Shop::default());
        let app = axum::Router::new()
            .route(
                "/carts/current",
                get(|State(shop): State<Arc<Shop>>| async move { shop.cart() }),
            )
            .route(
                "/products/by-external-code",
                get(
                    |State(shop): State<Arc<Shop>>, Query(q): Query<HashMap<String, String>>| async move {
                        shop.lookups.lock().unwrap().push(q.clone());
                        if q.get("product_code").map(String::as_str) == Some("NOPE") {
                            return (
                                StatusCode::NOT_FOUND,
                                Json(serde_json::json!({"detail": "Product not found"})),
                            )
                                .into_response();
                        }
                        (StatusCode::OK, Json(serde_json::json!({"product_id": 42})))
                            .into_response()
                    },
                ),
            )
            .route(
                "/carts/",
                post(
                    |State(shop): State<Arc<Shop>>,
                     headers: HeaderMap,
                     Json(body): Json<serde_json::Value>| async move {
                        if !authorized(&headers) {
                            return Err((
                                StatusCode::UNAUTHORIZED,
                                Json(serde_json::json!({"detail": "Customer Unauthorized"})),
                            ));
                        }
                        shop.items.lock().unwrap().push(CartItem {
                            product_id: body["product_id"].as_i64().unwrap_or_default(),
                            product_name: "Day pass".into(),
                            amount: body["amount"].as_u64().unwrap_or_default() as u32,
                            price: 1250,
                        });
                        Ok(shop.cart())
                    },
                ),
            )
            .route(
                "/carts/update-amount",
                put(
                    |State(shop): State<Arc<Shop>>, Json(body): Json<serde_json::Value>| async move {
                        let id = body["product_id"].as_i64().unwrap_or_default();
                        let amount = body["amount"].as_u64().unwrap_or_default() as u32;
                        for item in shop.items.lock().unwrap().iter_mut() {
                            if item.product_id == id {
                                item.amount = amount;
                            }
                        }
                        shop.cart()
                    },
                ),
            )
            .route(
                "/carts/{id}",
                delete(|State(shop): State<Arc<Shop>>, Path(id): Path<i64>| async move {
                    shop.items.lock().unwrap().retain(|item| item.product_id != id);
                    shop.cart()
                }),
            )
            .with_state(shop.clone());
        (spawn_server(app).await, shop)
    }

    #[test]
    fn counts_and_totals() {
        let cart = Cart {
            cart_empty: false,
            items: vec![
                CartItem {
                    product_id: 1,
                    product_name: "Adult".into(),
                    amount: 2,
                    price: 1500,
                },
                CartItem {
                    product_id: 2,
                    product_name: "Child".into(),
                    amount: 3,
                    price: 700,
                },
            ],
        };
        assert_eq!(cart.item_count(), 5);
        assert_eq!(cart.total_cents(), 5100);
        assert!(!cart.is_empty());
    }

    #[test]
    fn cart_flagged_empty_counts_zero() {
        let cart: Cart = serde_json::from_value(serde_json::json!({
            "cart_empty": true,
            "items": [{"product_id": 1, "product_name": "x", "amount": 4, "price": 10}]
        }))
        .unwrap();
        assert_eq!(cart.item_count(), 0);
        assert_eq!(cart.total_cents(), 0);

        let bare: Cart = serde_json::from_value(serde_json::json!({"cart_empty": true})).unwrap();
        assert!(bare.items.is_empty());
    }

    #[test]
    fn no_content_is_not_a_cart() {
        let err = Cart::from_payload(Payload::NoContent).unwrap_err();
        assert!(matches!(err, RequestError::Decode(_)));
    }

    #[test]
    fn unrelated_object_is_not_a_cart() {
        let err = Cart::from_payload(Payload::Json(serde_json::json!({"product_id": 42})))
            .unwrap_err();
        assert!(matches!(err, RequestError::Decode(_)));
        let err = Cart::from_payload(Payload::Json(serde_json::json!([]))).unwrap_err();
        assert!(matches!(err, RequestError::Decode(_)));

        let bare = Cart::from_payload(Payload::Json(serde_json::json!({"cart_empty": true}))).unwrap();
        assert!(bare.is_empty());
        let listed = Cart::from_payload(Payload::Json(serde_json::json!({"items": []}))).unwrap();
        assert!(!listed.cart_empty);
    }

    #[tokio::test]
    async fn add_update_remove_roundtrip() {
        let (url, shop) = start_shop().await;
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        store
            .set_token(storefront_auth::TokenSlot::Customer, "cust".into())
            .await
            .unwrap();
        let api = CartApi::new(challenge_executor(&url, store));

        assert!(api.load().await.unwrap().is_empty());

        let cart = api.add_product("DAY PASS", "P&1", 0).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].product_id, 42);
        assert_eq!(cart.items[0].amount, 1, "amount is raised to one");

        let lookups = shop.lookups.lock().unwrap().clone();
        assert_eq!(lookups[0]["product_code"], "DAY PASS");
        assert_eq!(lookups[0]["park_code"], "P&1");

        let cart = api.update_amount(42, 0).await.unwrap();
        assert_eq!(cart.items[0].amount, 1);
        let cart = api.update_amount(42, 4).await.unwrap();
        assert_eq!(cart.item_count(), 4);
        assert_eq!(cart.total_cents(), 5000);

        let cart = api.remove_item(42).await.unwrap();
        assert!(cart.cart_empty);
    }

    #[tokio::test]
    async fn add_without_login_challenges_only_the_add_step() {
        let (url, shop) = start_shop().await;
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let api = CartApi::new(challenge_executor(&url, store.clone()));

        let err = api.add_product("DAY", "P1", 2).await.unwrap_err();
        let RequestError::AuthenticationRequired(call) = err else {
            panic!("expected AuthenticationRequired, got {err:?}");
        };
        assert_eq!(call.path(), "/carts/");

        store
            .set_token(storefront_auth::TokenSlot::Customer, "cust".into())
            .await
            .unwrap();
        let cart = Cart::from_payload(call.run().await.unwrap()).unwrap();
        assert_eq!(cart.item_count(), 2);
        assert_eq!(shop.lookups.lock().unwrap().len(), 1, "lookup is not repeated");
    }

    #[tokio::test]
    async fn unknown_product_surfaces_detail() {
        let (url, _shop) = start_shop().await;
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        let api = CartApi::new(challenge_executor(&url, store));

        let err = api.add_product("NOPE", "P1", 1).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.user_message().as_deref(), Some("Product not found"));
    }

    #[tokio::test]
    async fn cart_calls_carry_store_credential() {
        let (url, api_state) = start_mock_api().await;
        api_state.accept_token("cust");
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        store
            .set_token(storefront_auth::TokenSlot::Customer, "cust".into())
            .await
            .unwrap();
        let api = CartApi::new(challenge_executor(&url, store));

        // The echo body is not a cart, but the request shape is what matters here
        let _ = api.remove_item(7).await;
        let hits = api_state.hits("/carts/7");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].method, "DELETE");
        assert_eq!(hits[0].store_credential.as_deref(), Some(crate::testing::STORE_CREDENTIAL));
        assert_eq!(hits[0].customer_auth.as_deref(), Some("Bearer cust"));
    }
}
