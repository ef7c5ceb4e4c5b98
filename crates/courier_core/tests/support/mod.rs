#![allow(dead_code)]

pub mod tracking;
