use reqwest::Response;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Failed to get bytes from the body of the message: {0}")]
    Body(#[from] reqwest::Error),
    #[error(
        "Failed to deserialize (supposedly JSON) to the specified type, the \
         text message is {text:?}"
    )]
    Json {
        text:   String,
        #[source]
        source: serde_json::Error,
    },
}

pub async fn deserialize_response<T>(response: Response) -> Result<T, DecodeError>
where
    T: DeserializeOwned,
{
    let full = response.bytes().await?;

    serde_json::from_slice(&full).map_err(|source| DecodeError::Json {
        text: String::from_utf8_lossy(&full).into_owned(),
        source,
    })
}
