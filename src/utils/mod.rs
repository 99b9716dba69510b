pub mod images;
pub mod jwt;
pub mod password;
pub mod sanitize;

pub use images::normalize_image_url;
pub use jwt::{encode_access_token, encode_refresh_token};
pub use password::{hash_password, verify_password};
pub use sanitize::strip_html;
