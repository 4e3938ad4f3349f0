//! # Dex Operator
//!
//! A Kubernetes controller that bootstraps Dex SSO servers from `DexServer`
//! resources.
//!
//! For each `DexServer` the controller creates, in order:
//!
//! 1. the `grpc-mtls` secret with a fresh CA, server and client certificate
//! 2. a ConfigMap holding the generated Dex `config.yaml`
//! 3. the web and gRPC Services
//! 4. the Dex ServiceAccount, ClusterRole and ClusterRoleBinding
//! 5. the Dex Deployment
//! 6. an OpenShift Route for the issuer host
//!
//! One step is completed per pass; the controller requeues until every object
//! exists. Existing objects are never updated. Everything is owned by the
//! `DexServer` and removed with it by garbage collection.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod runtime;
