/// Significant digits kept by decimal division
pub const DIVISION_PRECISION: u64 = 34;

/// Supply value is divided by this factor to get the borrow capacity
pub const DEFAULT_COLLATERAL_FACTOR: &str = "1.5";

/// Markets registered on startup when `SEED_DEFAULT_MARKETS=true`
///
/// (market id, symbol, reference units per underlying token)
pub const DEFAULT_MARKETS: [(&str, &str, &str); 5] = [
    ("0x9636246bf34e688c6652af544418b38eb51d2c43", "cBAT", "0.002"),
    ("0xb5e5d0f8c0cba267cd3d7035d6adc8eba7df7cdd", "cDAI", "0.007"),
    ("0x8a9447df1fb47209d36204e6d56767a33bf20f9f", "cETH", "1"),
    ("0x0a1e4d0b5c71b955c0a5993023fc48ba6e380496", "cREP", "0.102"),
    ("0x19787bcf63e228a6669d905e90af397dca313cfc", "cZRX", "0.0022"),
];
