pub mod weather;

pub use weather::{Weather, WeatherReading};
