//! Tag numbers of the standard header and trailer fields the engine itself
//! needs to recognize. All other tags come from the dictionary.

use crate::TagNum;

pub const BEGIN_STRING: TagNum = 8;
pub const BODY_LENGTH: TagNum = 9;
pub const CHECK_SUM: TagNum = 10;
pub const MSG_TYPE: TagNum = 35;
pub const SENDING_TIME: TagNum = 52;
pub const APPL_VER_ID: TagNum = 1128;
pub const CSTM_APPL_VER_ID: TagNum = 1129;
