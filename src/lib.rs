#[macro_use]
extern crate diesel;

pub mod config;
pub mod controllers;
pub mod db;
pub mod engine;
pub mod events;
pub mod permissions;
