//! The out-of-band login round trip: PKCE material, the scoped cookies
//! that carry handshake state, the redirect/callback flow itself, and the
//! username/password check behind the login prompt.

pub mod cookies;
pub mod flow;
pub mod login;
pub mod pkce;

pub use cookies::{CookieJarUpdate, STATE_COOKIE, VERIFIER_COOKIE};
pub use flow::{CallbackParams, InteractionFlow, LoginStart, SessionEstablished, SessionTokens};
pub use login::LoginService;
