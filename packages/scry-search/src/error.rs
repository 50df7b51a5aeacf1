pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error("Engine returned status {status}: {body}")]
	Engine { status: u16, body: String },
	#[error("{message}")]
	InvalidResponse { message: String },
}
