/*!
Example: interpreting Official Account errcode values

Run:
  cargo run --example error_help

Shows how to branch on errcode: retry after a fixed sleep, refresh the
access_token, or fix the request.
*/

use wxopen_rs::errcode::{
    contains_wrong_json_format, explain, is_auth_issue, is_not_found, is_temporary, lookup,
    should_refresh_token, should_retry,
};

fn main() {
    let samples: &[(i64, &str)] = &[
        (-1, "system error"),
        (0, "ok"),
        (40001, "invalid credential"),
        (40013, "invalid appid"),
        (42001, "access_token expired"),
        (45009, "reach max api daily quota limit"),
        (45015, "response out of time limit"),
        (46003, "menu no exist"),
        (48001, "api unauthorized"),
        (123456, "unknown"),
        (40007, "Warning: wrong json format."),
    ];

    println!("== errcode explanation demo ==");
    for &(code, errmsg) in samples {
        println!("\n- errcode={} errmsg='{}'\n  {}", code, errmsg, explain(code, errmsg));

        let help = lookup(code);
        println!(
            "  category={:?} refresh_token={} retry={{enabled:{}, sleep_ms:{:?}, max_retries:{:?}}}",
            help.category, help.refresh_token, help.retry.retry, help.retry.sleep_ms, help.retry.max_retries
        );
        println!(
            "  tags: auth={} temporary={} not_found={}",
            is_auth_issue(code),
            is_temporary(code),
            is_not_found(code)
        );

        let action = if code == 0 {
            "nothing to do"
        } else if should_retry(code).retry {
            "retry after a fixed sleep"
        } else if should_refresh_token(code) {
            "drop the cached access_token and call again"
        } else if contains_wrong_json_format(errmsg) {
            "fix the request body JSON"
        } else {
            "check parameters and account permissions"
        };
        println!("  action: {}", action);
    }
}
