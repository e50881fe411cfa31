/// Session cookies
///
/// Both tokens travel as httpOnly cookies so client-side scripts never see them.

use actix_web::cookie::{time::Duration, Cookie, SameSite};

use crate::configuration::AuthSettings;

pub const ACCESS_COOKIE: &str = "token";
pub const REFRESH_COOKIE: &str = "refreshToken";

/// Builds the `token` and `refreshToken` cookies
#[derive(Debug, Clone)]
pub struct CookiePolicy {
    secure: bool,
    access_max_age: i64,
    refresh_max_age: i64,
}

impl CookiePolicy {
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self {
            secure: settings.cookie_secure,
            access_max_age: settings.access_token.ttl_seconds,
            refresh_max_age: settings.refresh_token.ttl_seconds,
        }
    }

    pub fn access_cookie(&self, token: &str) -> Cookie<'static> {
        self.build(ACCESS_COOKIE, token.to_string(), SameSite::Lax, self.access_max_age)
    }

    /// The refresh cookie is never needed on cross-site navigations
    pub fn refresh_cookie(&self, token: &str) -> Cookie<'static> {
        self.build(REFRESH_COOKIE, token.to_string(), SameSite::Strict, self.refresh_max_age)
    }

    /// An already-expired cookie that makes the browser drop `name`
    pub fn removal(&self, name: &'static str) -> Cookie<'static> {
        let same_site = if name == REFRESH_COOKIE {
            SameSite::Strict
        } else {
            SameSite::Lax
        };
        let mut cookie = self.build(name, String::new(), same_site, 0);
        cookie.make_removal();
        cookie
    }

    fn build(
        &self,
        name: &'static str,
        value: String,
        same_site: SameSite,
        max_age_seconds: i64,
    ) -> Cookie<'static> {
        Cookie::build(name, value)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(same_site)
            .max_age(Duration::seconds(max_age_seconds))
            .finish()
    }
}
