// ABOUTME: Test helper modules shared by the HTTP-level integration tests
// ABOUTME: Declares the axum request/response utilities
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 German Neuroinformatics Node (G-Node)

#![allow(dead_code)]

pub mod axum_test;
