use std::borrow::Cow;

/// Provider identifier - mostly static constants ("IBKR", "TASTYTRADE")
pub type ProviderId = Cow<'static, str>;
