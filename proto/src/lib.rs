pub mod issues {
    tonic::include_proto!("issues");
}

pub mod eventbus {
    tonic::include_proto!("eventbus");
}
