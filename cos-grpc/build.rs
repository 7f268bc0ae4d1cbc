use tonic_build::manual::{Builder, Method, Service};

// Message types live in src/proto.rs; only the service stubs are generated.
fn method(name: &str, route: &str, input: &str, output: &str) -> tonic_build::manual::MethodBuilder {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{input}"))
        .output_type(format!("crate::proto::{output}"))
        .codec_path("tonic_prost::ProstCodec")
}

fn main() {
    let chunk_service = Service::builder()
        .name("ChunkService")
        .package("cos")
        .method(method("store_chunk", "StoreChunk", "ChunkInfo", "StoreChunkResponse").build())
        .method(method("get_chunk", "GetChunk", "GetChunkRequest", "ChunkInfo").build())
        .build();

    let object_service = Service::builder()
        .name("ObjectService")
        .package("cos")
        .method(
            method("upload_file", "UploadFile", "ChunkInfo", "UploadFileResponse")
                .client_streaming()
                .build(),
        )
        .method(
            method("download_file", "DownloadFile", "DownloadFileRequest", "ChunkInfo")
                .server_streaming()
                .build(),
        )
        .build();

    Builder::new().compile(&[chunk_service, object_service]);
    println!("cargo:rerun-if-changed=build.rs");
}
