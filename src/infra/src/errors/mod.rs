// Copyright 2026 KillKrill Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IoError# {0}")]
    IoError(#[from] std::io::Error),
    #[error("RedisError# {0}")]
    Redis(#[from] redis::RedisError),
    #[error("SqlxError# {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("SerdeJsonError# {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("ReqwestError# {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Admission# {0}")]
    Admission(String),
    #[error("Authentication# {0}")]
    Authentication(String),
    #[error("Validation# {0}")]
    Validation(String),
    #[error("Resource# {0}")]
    Resource(String),
    #[error("Transform# {0}")]
    Transform(String),
    #[error("Timeout# {0}")]
    Timeout(String),
    #[error("Fatal# {0}")]
    Fatal(String),
    #[error("Message# {0}")]
    Message(String),
    #[error("NotImplemented# {0}")]
    NotImplemented(String),
}

pub type Result<T> = std::result::Result<T, Error>;
