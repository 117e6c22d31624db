use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use redis::AsyncCommands;

#[derive(Clone)]
pub struct RateLimitState {
    pub redis_client: redis::Client,
    pub max_per_minute: i64,
}

/// First address in `x-forwarded-for`, or `unknown`.
pub fn client_ip(request: &Request<Body>) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// Fixed one-minute window per client. Requests pass through when Redis is unreachable.
pub async fn enforce(
    State(state): State<RateLimitState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = format!(
        "proxypay:rate:{}:{}",
        client_ip(&request),
        chrono::Utc::now().format("%Y%m%d%H%M")
    );

    match state.redis_client.get_multiplexed_async_connection().await {
        Ok(mut conn) => {
            let count: i64 = conn.incr(&key, 1).await.unwrap_or(1);
            let _: bool = conn.expire(&key, 120).await.unwrap_or(false);
            if count > state.max_per_minute {
                tracing::warn!("rate limit exceeded for {}", key);
                return Response::builder()
                    .status(StatusCode::TOO_MANY_REQUESTS)
                    .body(Body::from("rate limit exceeded"))
                    .unwrap_or_else(|_| Response::new(Body::from("rate limit exceeded")));
            }
        }
        Err(e) => tracing::debug!("rate limiter skipped, redis unavailable: {}", e),
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::client_ip;
    use axum::body::Body;
    use axum::http::Request;

    #[test]
    fn takes_first_forwarded_address() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.7, 172.16.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), "10.0.0.7");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&bare), "unknown");
    }
}
