//! Transport layer: the [`Transport`] seam and its reqwest implementation.

pub mod client;

pub use client::{
    HttpClient, HttpClientBuilder, HttpRequest, HttpResponse, Transport, TransportError,
};
