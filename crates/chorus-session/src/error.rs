// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("reading session record at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("writing session record at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("decoding session record at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("encoding session record: {0}")]
    Encode(#[source] serde_yaml::Error),
}
