//! Plugin protocol types generated from `proto/provider.proto` by the build script.

tonic::include_proto!("plugin.provider.v1");
