#![allow(dead_code)]

pub mod jobs;
