use tracing::debug;

#[derive(Debug, thiserror::Error)]
#[error("{status_code} status code")]
pub struct ServerError {
    pub status_code: u16,
    pub body: String,
}

/// Turn a non-success response into a [`ServerError`] carrying the body.
///
/// A body that cannot be read leaves `body` empty.
pub async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, ServerError> {
    let status = res.status();
    if !status.is_success() {
        let body = match res.text().await {
            Ok(body) => body,
            Err(err) => {
                debug!(
                    message = "Unable to read error response body",
                    status_code = status.as_u16(),
                    error = %err,
                );
                String::new()
            }
        };
        return Err(ServerError {
            status_code: status.as_u16(),
            body,
        });
    }
    Ok(res)
}
