//! penwright: a blog front end serving incrementally regenerated article
//! pages from a headless content API, with moderated comments.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
