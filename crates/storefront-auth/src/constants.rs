//! Commerce API wire constants
//!
//! Header names, endpoint paths, and the `detail` strings the API uses to
//! tell a tenant misconfiguration apart from a missing end-user session.

/// Header carrying the tenant-identifying store credential
pub const STORE_CREDENTIAL_HEADER: &str = "Store-Credential";

/// Header carrying the customer bearer token
pub const CUSTOMER_AUTHORIZATION_HEADER: &str = "Customer-Authorization";

/// Header carrying the seller bearer token
pub const SELLER_AUTHORIZATION_HEADER: &str = "Seller-Authorization";

/// `detail` value for a rejected store credential. Never triggers a login prompt.
pub const STORE_CREDENTIAL_INVALID: &str = "Store credential is invalid";

/// `detail` values meaning the end user is not authenticated.
///
/// The bare form is the documented one; the backend's token guards emit the
/// scoped forms.
pub const UNAUTHORIZED_DETAILS: &[&str] =
    &["Unauthorized", "Customer Unauthorized", "Seller Unauthorized"];

/// Customer login endpoint
pub const CUSTOMER_AUTH_PATH: &str = "/customers/auth";

/// Customer account creation endpoint
pub const CUSTOMER_REGISTER_PATH: &str = "/customers/";

/// Seller admin login page, the force-reauth redirect target
pub const SELLER_LOGIN_PATH: &str = "/seller/admin/login";

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;
