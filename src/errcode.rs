//! Official Account / Open Platform errcode helpers
//!
//! - Map well-known global errcode values to categories and hints
//! - Recommend whether to retry, or to refresh the access_token
//! - Detect the "wrong json format" warning some endpoints return
//!
//! Program logic should depend on `errcode`, never on `errmsg`; the message
//! text changes without notice and is only useful for diagnostics.
//!
//! Unknown codes are `Unknown`: no retry, no token refresh.

/// High-level classification for an error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// errcode = 0
    Success,
    /// System busy (retryable)
    TemporarySystem,
    /// Credential, token or whitelist problems
    Auth,
    /// Invalid parameter, wrong type/size/range
    InvalidParam,
    /// Resource does not exist
    NotFound,
    /// Quota or frequency limit
    Limit,
    /// API not authorized for this account
    Unsupported,
    /// Timing constraints (48-hour reply window, subscription required)
    InvalidState,
    Unknown,
}

/// Recommendation for retry strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAdvice {
    pub retry: bool,
    /// Suggested fixed sleep between attempts in milliseconds
    pub sleep_ms: Option<u64>,
    pub max_retries: Option<u8>,
    pub reason: &'static str,
}

impl RetryAdvice {
    pub const NO: RetryAdvice = RetryAdvice {
        retry: false,
        sleep_ms: None,
        max_retries: None,
        reason: "do not retry",
    };
    pub const BUSY: RetryAdvice = RetryAdvice {
        retry: true,
        sleep_ms: Some(1000),
        max_retries: Some(5),
        reason: "system busy; retry after a fixed sleep",
    };
}

/// A compact explanation for an errcode.
#[derive(Debug, Clone)]
pub struct ErrorHelp {
    pub code: i64,
    pub category: ErrorCategory,
    pub summary: &'static str,
    pub hint: &'static str,
    pub retry: RetryAdvice,
    /// Whether the cached access_token should be dropped
    pub refresh_token: bool,
}

pub fn hint_for(code: i64) -> &'static str {
    match code {
        -1 => "System busy; the client retries automatically with a fixed sleep.",
        0 => "Success.",
        40001 => {
            "Invalid credential; the AppSecret is wrong or the access_token is not for this appid. Refresh the token and verify the credential pair."
        }
        40002 => "Invalid grant_type; token requests must use client_credential.",
        40003 => "Invalid openid; the user must belong to this Official Account.",
        40007 => "Invalid media_id; upload the media again (temporary media lives 3 days).",
        40013 => "Invalid appid; check the AppID in the developer console (starts with 'wx').",
        40014 => "Invalid access_token; the cached token is dropped, the next call fetches a new one.",
        40037 => "Invalid template_id; add the template to the account first.",
        40164 => "Caller IP is not in the API whitelist; add it in the developer console.",
        41001 => "Missing access_token parameter.",
        42001 => "access_token expired; the cached token is dropped, the next call fetches a new one.",
        43004 => "Receiver has not subscribed; kefu/template messages need a subscribed user.",
        45009 => "Daily API quota reached; wait for the next day or reset the quota in the console.",
        45015 => "Reply window closed; kefu messages are allowed within 48h of the user's last interaction.",
        45047 => "Kefu message limit reached for this session; wait for the user to interact again.",
        46003 => "Menu does not exist.",
        47001 => "Malformed JSON/XML body; fix the request and resend.",
        48001 => "API not authorized; the account type or certification does not grant this API.",
        65301 => "Conditional menu not found for the given menuid.",
        65303 => "No default menu; create the default menu before conditional ones.",
        _ => "Unknown code; refer to official docs and logs for details.",
    }
}

pub fn category_for(code: i64) -> ErrorCategory {
    match code {
        0 => ErrorCategory::Success,
        -1 => ErrorCategory::TemporarySystem,
        40001 | 40002 | 40013 | 40014 | 40164 | 41001 | 42001 => ErrorCategory::Auth,
        40003 | 40007 | 40037 | 47001 => ErrorCategory::InvalidParam,
        46003 | 65301 | 65303 => ErrorCategory::NotFound,
        45009 | 45047 => ErrorCategory::Limit,
        48001 => ErrorCategory::Unsupported,
        43004 | 45015 => ErrorCategory::InvalidState,
        _ => ErrorCategory::Unknown,
    }
}

pub fn should_retry(code: i64) -> RetryAdvice {
    match code {
        -1 => RetryAdvice::BUSY,
        40001 | 40014 | 42001 => RetryAdvice {
            retry: false,
            sleep_ms: None,
            max_retries: None,
            reason: "invalid or expired token; refresh before calling again",
        },
        40003 | 40007 | 40037 | 47001 => RetryAdvice {
            retry: false,
            sleep_ms: None,
            max_retries: None,
            reason: "invalid parameter; correct request and resend",
        },
        _ => RetryAdvice::NO,
    }
}

/// Whether the cached access_token must be dropped for this code.
pub fn should_refresh_token(code: i64) -> bool {
    matches!(code, 40001 | 40014 | 42001)
}

pub fn lookup(code: i64) -> ErrorHelp {
    let summary = match code {
        -1 => "System busy",
        0 => "Success",
        40001 => "Invalid credential",
        40002 => "Invalid grant_type",
        40003 => "Invalid openid",
        40007 => "Invalid media_id",
        40013 => "Invalid appid",
        40014 => "Invalid access_token",
        40037 => "Invalid template_id",
        40164 => "IP not whitelisted",
        41001 => "Missing access_token",
        42001 => "access_token expired",
        43004 => "Receiver not subscribed",
        45009 => "API daily limit reached",
        45015 => "Reply time limit (48h)",
        45047 => "Kefu message limit",
        46003 => "Menu not exist",
        47001 => "Malformed body",
        48001 => "API unauthorized",
        65301 => "Conditional menu not found",
        65303 => "No default menu",
        _ => "Unknown error",
    };

    ErrorHelp {
        code,
        category: category_for(code),
        summary,
        hint: hint_for(code),
        retry: should_retry(code),
        refresh_token: should_refresh_token(code),
    }
}

/// One-line explanation: code, category, summary, hint, retry and refresh advice.
pub fn explain(errcode: i64, errmsg: &str) -> String {
    let help = lookup(errcode);
    let mut parts = vec![
        format!("errcode={} ({:?})", help.code, help.category),
        help.summary.to_string(),
        format!("hint: {}", help.hint),
    ];

    if help.retry.retry {
        let mut retry_line = String::from("retry: yes");
        if let Some(ms) = help.retry.sleep_ms {
            retry_line.push_str(&format!(", sleep_ms={}", ms));
        }
        if let Some(n) = help.retry.max_retries {
            retry_line.push_str(&format!(", max_retries={}", n));
        }
        retry_line.push_str(&format!(" ({})", help.retry.reason));
        parts.push(retry_line);
    } else {
        parts.push(format!("retry: no ({})", help.retry.reason));
    }

    parts.push(format!(
        "refresh_token: {}",
        if help.refresh_token { "yes" } else { "no" }
    ));

    if contains_wrong_json_format(errmsg) {
        parts.push("detected: wrong json format; validate the request body".to_string());
    }

    parts.join(" | ")
}

/// Detect the "Warning: wrong json format." substring (case-insensitive).
pub fn contains_wrong_json_format(errmsg: &str) -> bool {
    errmsg
        .to_ascii_lowercase()
        .contains("warning: wrong json format")
}

pub fn is_temporary(code: i64) -> bool {
    matches!(category_for(code), ErrorCategory::TemporarySystem)
}

pub fn is_auth_issue(code: i64) -> bool {
    matches!(category_for(code), ErrorCategory::Auth)
}

pub fn is_not_found(code: i64) -> bool {
    matches!(category_for(code), ErrorCategory::NotFound)
}
