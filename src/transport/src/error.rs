// Copyright 2026 Meridian Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use meridian_common::CoreError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("connection to {host}:{port} failed: {underlying}")]
    ConnectionFailed {
        host: String,
        port: u16,
        underlying: String,
    },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("bind failed on {host}:{port}: {underlying}")]
    BindFailed {
        host: String,
        port: u16,
        underlying: String,
    },
    #[error("invalid transport configuration: {0}")]
    InvalidConfiguration(String),
    #[error("i/o error: {0}")]
    Io(String),
}

pub type TransportResult<T> = Result<T, TransportError>;

impl From<TransportError> for CoreError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::ConnectionFailed {
                host,
                port,
                underlying,
            } => CoreError::ConnectionFailed {
                host,
                port,
                underlying,
            },
            TransportError::ConnectionClosed => CoreError::ConnectionClosed,
            TransportError::BindFailed { underlying, .. } => {
                CoreError::InvalidConfiguration(underlying)
            }
            TransportError::InvalidConfiguration(msg) => CoreError::InvalidConfiguration(msg),
            TransportError::Io(msg) => CoreError::ConnectionFailed {
                host: String::new(),
                port: 0,
                underlying: msg,
            },
        }
    }
}
