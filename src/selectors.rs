//! DOM selectors for the identity provider and target service pages.

pub const PRIMARY_BUTTON: &str = r#"button[data-testid="primaryButton"]"#;
pub const SECONDARY_BUTTON: &str = r#"button[data-testid="secondaryButton"]"#;

pub const ACCOUNT_LOCKED: &str = "#serviceAbuseLandingTitle";
pub const ERROR_ALERT: &str = r#"div[role="alert"]"#;
pub const PASSWORD_INPUT: &str = r#"[data-testid="passwordEntry"]"#;
pub const EMAIL_INPUT: &str = "input#usernameEntry";
pub const KMSI_VIDEO: &str = r#"[data-testid="kmsiVideo"]"#;
pub const PASSKEY_VIDEO: &str = r#"[data-testid="biometricVideo"]"#;
pub const PASSKEY_ERROR: &str = r#"[data-testid="registrationImg"]"#;
/// The "use my password" tile, identified by its key icon path
pub const PASSWORD_TILE: &str = r#"[data-testid="tile"]:has(svg path[d*="M11.78 10.22a.75.75"])"#;
pub const PASSWORDLESS_CHECKMARK: &str = r#"[data-testid="deviceShieldCheckmarkVideo"]"#;
pub const TOTP_OTC_INPUT: &str = r#"input[name="otc"]"#;
pub const TOTP_FORM: &str = r#"form[name="OneTimeCodeViewForm"]"#;
pub const IDENTITY_BANNER: &str = r#"[data-testid="identityBanner"]"#;
pub const FOOTER_OTHER_WAY: &str = r#"[data-testid="viewFooter"] span[role="button"]"#;

pub const TOTP_VISIBLE_INPUT: &str =
    r#"form[name="OneTimeCodeViewForm"] input[type="text"], input#floatingLabelInput5"#;
pub const TOTP_HIDDEN_INPUT: &str = r#"input[id="otc-confirmation-input"], input[name="otc"]"#;
pub const SUBMIT_BUTTON: &str = r#"button[type="submit"]"#;

pub const PASSWORDLESS_NUMBER: &str = r#"div[data-testid="displaySign"]"#;

pub const REQUEST_TOKEN_NAME: &str = "__RequestVerificationToken";
