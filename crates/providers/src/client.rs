use reqwest::{Client, Proxy};
use std::time::Duration;
use tracing::{info, warn};

/// Proxy inputs gathered from config for one upstream endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxySettings<'a> {
    /// `providers.<name>.proxy`. `Some("")` forces a direct connection.
    pub provider: Option<&'a str>,
    /// `network.proxy`
    pub global: Option<&'a str>,
    /// `network.noProxy`
    pub no_proxy: &'a [String],
}

#[derive(Debug, PartialEq, Eq)]
enum Route {
    Proxy(String),
    Direct,
    /// Leave it to reqwest, which reads HTTPS_PROXY / HTTP_PROXY.
    Environment,
}

/// 规则：精确匹配；"*.example.com" 仅匹配子域名；".example.com" 匹配自身和子域名
fn host_bypasses_proxy(host: &str, rules: &[String]) -> bool {
    let host = host.to_lowercase();
    rules.iter().any(|rule| {
        let rule = rule.trim().to_lowercase();
        if rule.is_empty() {
            false
        } else if let Some(suffix) = rule.strip_prefix("*.") {
            host.ends_with(&format!(".{}", suffix))
        } else if let Some(suffix) = rule.strip_prefix('.') {
            host == suffix || host.ends_with(&format!(".{}", suffix))
        } else {
            host == rule
        }
    })
}

fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let authority = rest.split('/').next()?;
    let host_port = authority.rsplit('@').next()?;
    if let Some(v6) = host_port.strip_prefix('[') {
        return v6.split(']').next();
    }
    host_port.split(':').next()
}

fn route_for(settings: &ProxySettings<'_>, api_base: &str) -> Route {
    match settings.provider {
        Some("") => return Route::Direct,
        Some(p) => return Route::Proxy(p.to_string()),
        None => {}
    }

    match settings.global {
        Some(global) if !global.is_empty() => {
            let bypass = host_of(api_base)
                .map(|h| host_bypasses_proxy(h, settings.no_proxy))
                .unwrap_or(false);
            if bypass {
                Route::Direct
            } else {
                Route::Proxy(global.to_string())
            }
        }
        _ => Route::Environment,
    }
}

/// 构建带代理配置的 reqwest::Client，优先级：provider 代理 > 全局代理(受 noProxy 过滤) > 环境变量
pub fn build_http_client(settings: &ProxySettings<'_>, api_base: &str, timeout: Duration) -> Client {
    let mut builder = Client::builder().timeout(timeout);

    match route_for(settings, api_base) {
        Route::Proxy(url) => match Proxy::all(&url) {
            Ok(proxy) => {
                info!(proxy = %url, api_base = %api_base, "LLM provider using proxy");
                builder = builder.proxy(proxy);
            }
            Err(e) => {
                warn!(error = %e, proxy = %url, "Invalid proxy URL, falling back to direct connect");
            }
        },
        Route::Direct => {
            info!(api_base = %api_base, "LLM provider forced to direct connect");
            builder = builder.no_proxy();
        }
        Route::Environment => {}
    }

    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to build HTTP client with proxy, using default");
        Client::new()
    })
}
