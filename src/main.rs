fn main() -> Result<(), eframe::Error> {
    // Set up logging for development
    env_logger::init();

    // Run the concept-map application
    codemap_studio::run_app()
}
