#[actix_web::main]
async fn main() -> std::io::Result<()> {
    acta_certificados_server::run().await
}
