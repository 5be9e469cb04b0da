use phf::phf_map;

/// Canonical Mattermost emoji name → unicode rendering. The reverse table
/// below must stay the exact inverse of this one; aliases live only here.
static EMOJI_BY_NAME: phf::Map<&'static str, &'static str> = phf_map! {
    // faces
    "smile" => "😄",
    "smiley" => "😃",
    "grinning" => "😀",
    "grin" => "😁",
    "laughing" => "😆",
    "sweat_smile" => "😅",
    "joy" => "😂",
    "rofl" => "🤣",
    "slightly_smiling_face" => "🙂",
    "upside_down_face" => "🙃",
    "wink" => "😉",
    "blush" => "😊",
    "innocent" => "😇",
    "heart_eyes" => "😍",
    "kissing_heart" => "😘",
    "yum" => "😋",
    "stuck_out_tongue" => "😛",
    "stuck_out_tongue_winking_eye" => "😜",
    "sunglasses" => "😎",
    "smirk" => "😏",
    "neutral_face" => "😐",
    "expressionless" => "😑",
    "thinking" => "🤔",
    "flushed" => "😳",
    "disappointed" => "😞",
    "worried" => "😟",
    "angry" => "😠",
    "rage" => "😡",
    "cry" => "😢",
    "sob" => "😭",
    "fearful" => "😨",
    "scream" => "😱",
    "confused" => "😕",
    "astonished" => "😲",
    "sleeping" => "😴",
    "mask" => "😷",
    "ghost" => "👻",
    "skull" => "💀",
    "alien" => "👽",
    "robot" => "🤖",
    "poop" => "💩",
    // gestures
    "+1" => "👍",
    "-1" => "👎",
    "ok_hand" => "👌",
    "clap" => "👏",
    "wave" => "👋",
    "raised_hands" => "🙌",
    "pray" => "🙏",
    "muscle" => "💪",
    "point_up" => "☝️",
    "point_right" => "👉",
    "point_left" => "👈",
    "fist" => "✊",
    "v" => "✌️",
    "eyes" => "👀",
    "handshake" => "🤝",
    // hearts and sparkle
    "heart" => "❤️",
    "broken_heart" => "💔",
    "blue_heart" => "💙",
    "green_heart" => "💚",
    "yellow_heart" => "💛",
    "purple_heart" => "💜",
    "sparkling_heart" => "💖",
    "star" => "⭐",
    "star2" => "🌟",
    "sparkles" => "✨",
    "fire" => "🔥",
    "boom" => "💥",
    "tada" => "🎉",
    "confetti_ball" => "🎊",
    "balloon" => "🎈",
    "gift" => "🎁",
    "trophy" => "🏆",
    "crown" => "👑",
    "gem" => "💎",
    "bell" => "🔔",
    "zap" => "⚡",
    "snowflake" => "❄️",
    "sunny" => "☀️",
    "cloud" => "☁️",
    "umbrella" => "☔",
    "rainbow" => "🌈",
    "droplet" => "💧",
    "ocean" => "🌊",
    // objects
    "rocket" => "🚀",
    "airplane" => "✈️",
    "car" => "🚗",
    "bike" => "🚲",
    "house" => "🏠",
    "office" => "🏢",
    "computer" => "💻",
    "iphone" => "📱",
    "telephone" => "☎️",
    "email" => "📧",
    "envelope" => "✉️",
    "memo" => "📝",
    "book" => "📖",
    "books" => "📚",
    "bulb" => "💡",
    "lock" => "🔒",
    "unlock" => "🔓",
    "key" => "🔑",
    "hammer" => "🔨",
    "wrench" => "🔧",
    "gear" => "⚙️",
    "link" => "🔗",
    "paperclip" => "📎",
    "scissors" => "✂️",
    "calendar" => "📅",
    "hourglass" => "⌛",
    "hourglass_flowing_sand" => "⏳",
    "alarm_clock" => "⏰",
    "watch" => "⌚",
    "camera" => "📷",
    "movie_camera" => "🎥",
    "musical_note" => "🎵",
    "headphones" => "🎧",
    "art" => "🎨",
    "mag" => "🔍",
    "moneybag" => "💰",
    "dollar" => "💵",
    "credit_card" => "💳",
    "package" => "📦",
    "pushpin" => "📌",
    "round_pushpin" => "📍",
    "triangular_flag_on_post" => "🚩",
    "speech_balloon" => "💬",
    "thought_balloon" => "💭",
    "zzz" => "💤",
    "dash" => "💨",
    "sweat_drops" => "💦",
    "chart_with_upwards_trend" => "📈",
    "chart_with_downwards_trend" => "📉",
    // games and sport
    "soccer" => "⚽",
    "basketball" => "🏀",
    "football" => "🏈",
    "baseball" => "⚾",
    "tennis" => "🎾",
    "dart" => "🎯",
    "game_die" => "🎲",
    "video_game" => "🎮",
    "checkered_flag" => "🏁",
    // food and drink
    "apple" => "🍎",
    "banana" => "🍌",
    "grapes" => "🍇",
    "strawberry" => "🍓",
    "watermelon" => "🍉",
    "peach" => "🍑",
    "pizza" => "🍕",
    "hamburger" => "🍔",
    "fries" => "🍟",
    "popcorn" => "🍿",
    "cake" => "🍰",
    "birthday" => "🎂",
    "cookie" => "🍪",
    "doughnut" => "🍩",
    "candy" => "🍬",
    "coffee" => "☕",
    "tea" => "🍵",
    "beer" => "🍺",
    "beers" => "🍻",
    "wine_glass" => "🍷",
    "cocktail" => "🍸",
    "tropical_drink" => "🍹",
    // animals
    "dog" => "🐶",
    "cat" => "🐱",
    "mouse" => "🐭",
    "hamster" => "🐹",
    "rabbit" => "🐰",
    "fox_face" => "🦊",
    "bear" => "🐻",
    "panda_face" => "🐼",
    "koala" => "🐨",
    "tiger" => "🐯",
    "lion" => "🦁",
    "cow" => "🐮",
    "pig" => "🐷",
    "frog" => "🐸",
    "monkey_face" => "🐵",
    "chicken" => "🐔",
    "penguin" => "🐧",
    "bird" => "🐦",
    "bee" => "🐝",
    "bug" => "🐛",
    "butterfly" => "🦋",
    "snail" => "🐌",
    "turtle" => "🐢",
    "fish" => "🐟",
    "whale" => "🐳",
    "dolphin" => "🐬",
    "unicorn" => "🦄",
    "dragon" => "🐉",
    // status
    "white_check_mark" => "✅",
    "heavy_check_mark" => "✔️",
    "x" => "❌",
    "warning" => "⚠️",
    "no_entry" => "⛔",
    "no_entry_sign" => "🚫",
    "question" => "❓",
    "exclamation" => "❗",
    "grey_question" => "❔",
    "100" => "💯",
    "red_circle" => "🔴",
    "large_blue_circle" => "🔵",
    "white_circle" => "⚪",
    "black_circle" => "⚫",
    "arrows_counterclockwise" => "🔄",
    "heavy_plus_sign" => "➕",
    "heavy_minus_sign" => "➖",
    "recycle" => "♻️",
    // more faces
    "pensive" => "😔",
    "relieved" => "😌",
    "sleepy" => "😪",
    "triumph" => "😤",
    "cold_sweat" => "😰",
    "open_mouth" => "😮",
    "hushed" => "😯",
    "dizzy_face" => "😵",
    "sweat" => "😓",
    "persevere" => "😣",
    "tired_face" => "😫",
    "weary" => "😩",
    "kissing" => "😗",
    "kissing_closed_eyes" => "😚",
    "imp" => "👿",
    "smiling_imp" => "😈",
    // nature
    "seedling" => "🌱",
    "herb" => "🌿",
    "four_leaf_clover" => "🍀",
    "maple_leaf" => "🍁",
    "fallen_leaf" => "🍂",
    "leaves" => "🍃",
    "cactus" => "🌵",
    "palm_tree" => "🌴",
    "evergreen_tree" => "🌲",
    "deciduous_tree" => "🌳",
    "cherry_blossom" => "🌸",
    "rose" => "🌹",
    "sunflower" => "🌻",
    "tulip" => "🌷",
    "blossom" => "🌼",
    "bouquet" => "💐",
    "mushroom" => "🍄",
    "earth_africa" => "🌍",
    "full_moon" => "🌕",
    "crescent_moon" => "🌙",
    // transport
    "bus" => "🚌",
    "taxi" => "🚕",
    "truck" => "🚚",
    "ship" => "🚢",
    "anchor" => "⚓",
    "helicopter" => "🚁",
    "tractor" => "🚜",
    "police_car" => "🚓",
    "fire_engine" => "🚒",
    "ambulance" => "🚑",
    // more objects
    "tv" => "📺",
    "radio" => "📻",
    "battery" => "🔋",
    "electric_plug" => "🔌",
    "flashlight" => "🔦",
    "newspaper" => "📰",
    "bookmark" => "🔖",
    "money_with_wings" => "💸",
    "clipboard" => "📋",
    "file_folder" => "📁",
    "open_file_folder" => "📂",
    "date" => "📆",
    "card_index" => "📇",
    "straight_ruler" => "📏",
    "triangular_ruler" => "📐",
    "telescope" => "🔭",
    "microscope" => "🔬",
    "syringe" => "💉",
    "pill" => "💊",
    "door" => "🚪",
    "bomb" => "💣",
    "crystal_ball" => "🔮",
    "satellite" => "📡",
    "mega" => "📣",
    "loudspeaker" => "📢",
    "mute" => "🔇",
    "sound" => "🔉",
    "loud_sound" => "🔊",
    // more food
    "bread" => "🍞",
    "egg" => "🥚",
    "taco" => "🌮",
    "burrito" => "🌯",
    "sushi" => "🍣",
    "ramen" => "🍜",
    "spaghetti" => "🍝",
    "curry" => "🍛",
    "bento" => "🍱",
    "rice" => "🍚",
    "ice_cream" => "🍨",
    "shaved_ice" => "🍧",
    "chocolate_bar" => "🍫",
    "lollipop" => "🍭",
    "honey_pot" => "🍯",
    "champagne" => "🍾",
    "sake" => "🍶",
    "melon" => "🍈",
    "cherries" => "🍒",
    "pineapple" => "🍍",
    "tomato" => "🍅",
    "eggplant" => "🍆",
    "corn" => "🌽",
    "sweet_potato" => "🍠",
    // aliases (canonical spelling wins on the way back)
    "thumbsup" => "👍",
    "thumbsdown" => "👎",
    "hankey" => "💩",
    "heavy_exclamation_mark" => "❗",
};

/// Unicode rendering → canonical Mattermost name. Exact inverse of the
/// canonical entries above.
static NAME_BY_EMOJI: phf::Map<&'static str, &'static str> = phf_map! {
    "😄" => "smile",
    "😃" => "smiley",
    "😀" => "grinning",
    "😁" => "grin",
    "😆" => "laughing",
    "😅" => "sweat_smile",
    "😂" => "joy",
    "🤣" => "rofl",
    "🙂" => "slightly_smiling_face",
    "🙃" => "upside_down_face",
    "😉" => "wink",
    "😊" => "blush",
    "😇" => "innocent",
    "😍" => "heart_eyes",
    "😘" => "kissing_heart",
    "😋" => "yum",
    "😛" => "stuck_out_tongue",
    "😜" => "stuck_out_tongue_winking_eye",
    "😎" => "sunglasses",
    "😏" => "smirk",
    "😐" => "neutral_face",
    "😑" => "expressionless",
    "🤔" => "thinking",
    "😳" => "flushed",
    "😞" => "disappointed",
    "😟" => "worried",
    "😠" => "angry",
    "😡" => "rage",
    "😢" => "cry",
    "😭" => "sob",
    "😨" => "fearful",
    "😱" => "scream",
    "😕" => "confused",
    "😲" => "astonished",
    "😴" => "sleeping",
    "😷" => "mask",
    "👻" => "ghost",
    "💀" => "skull",
    "👽" => "alien",
    "🤖" => "robot",
    "💩" => "poop",
    "👍" => "+1",
    "👎" => "-1",
    "👌" => "ok_hand",
    "👏" => "clap",
    "👋" => "wave",
    "🙌" => "raised_hands",
    "🙏" => "pray",
    "💪" => "muscle",
    "☝️" => "point_up",
    "👉" => "point_right",
    "👈" => "point_left",
    "✊" => "fist",
    "✌️" => "v",
    "👀" => "eyes",
    "🤝" => "handshake",
    "❤️" => "heart",
    "💔" => "broken_heart",
    "💙" => "blue_heart",
    "💚" => "green_heart",
    "💛" => "yellow_heart",
    "💜" => "purple_heart",
    "💖" => "sparkling_heart",
    "⭐" => "star",
    "🌟" => "star2",
    "✨" => "sparkles",
    "🔥" => "fire",
    "💥" => "boom",
    "🎉" => "tada",
    "🎊" => "confetti_ball",
    "🎈" => "balloon",
    "🎁" => "gift",
    "🏆" => "trophy",
    "👑" => "crown",
    "💎" => "gem",
    "🔔" => "bell",
    "⚡" => "zap",
    "❄️" => "snowflake",
    "☀️" => "sunny",
    "☁️" => "cloud",
    "☔" => "umbrella",
    "🌈" => "rainbow",
    "💧" => "droplet",
    "🌊" => "ocean",
    "🚀" => "rocket",
    "✈️" => "airplane",
    "🚗" => "car",
    "🚲" => "bike",
    "🏠" => "house",
    "🏢" => "office",
    "💻" => "computer",
    "📱" => "iphone",
    "☎️" => "telephone",
    "📧" => "email",
    "✉️" => "envelope",
    "📝" => "memo",
    "📖" => "book",
    "📚" => "books",
    "💡" => "bulb",
    "🔒" => "lock",
    "🔓" => "unlock",
    "🔑" => "key",
    "🔨" => "hammer",
    "🔧" => "wrench",
    "⚙️" => "gear",
    "🔗" => "link",
    "📎" => "paperclip",
    "✂️" => "scissors",
    "📅" => "calendar",
    "⌛" => "hourglass",
    "⏳" => "hourglass_flowing_sand",
    "⏰" => "alarm_clock",
    "⌚" => "watch",
    "📷" => "camera",
    "🎥" => "movie_camera",
    "🎵" => "musical_note",
    "🎧" => "headphones",
    "🎨" => "art",
    "🔍" => "mag",
    "💰" => "moneybag",
    "💵" => "dollar",
    "💳" => "credit_card",
    "📦" => "package",
    "📌" => "pushpin",
    "📍" => "round_pushpin",
    "🚩" => "triangular_flag_on_post",
    "💬" => "speech_balloon",
    "💭" => "thought_balloon",
    "💤" => "zzz",
    "💨" => "dash",
    "💦" => "sweat_drops",
    "📈" => "chart_with_upwards_trend",
    "📉" => "chart_with_downwards_trend",
    "⚽" => "soccer",
    "🏀" => "basketball",
    "🏈" => "football",
    "⚾" => "baseball",
    "🎾" => "tennis",
    "🎯" => "dart",
    "🎲" => "game_die",
    "🎮" => "video_game",
    "🏁" => "checkered_flag",
    "🍎" => "apple",
    "🍌" => "banana",
    "🍇" => "grapes",
    "🍓" => "strawberry",
    "🍉" => "watermelon",
    "🍑" => "peach",
    "🍕" => "pizza",
    "🍔" => "hamburger",
    "🍟" => "fries",
    "🍿" => "popcorn",
    "🍰" => "cake",
    "🎂" => "birthday",
    "🍪" => "cookie",
    "🍩" => "doughnut",
    "🍬" => "candy",
    "☕" => "coffee",
    "🍵" => "tea",
    "🍺" => "beer",
    "🍻" => "beers",
    "🍷" => "wine_glass",
    "🍸" => "cocktail",
    "🍹" => "tropical_drink",
    "🐶" => "dog",
    "🐱" => "cat",
    "🐭" => "mouse",
    "🐹" => "hamster",
    "🐰" => "rabbit",
    "🦊" => "fox_face",
    "🐻" => "bear",
    "🐼" => "panda_face",
    "🐨" => "koala",
    "🐯" => "tiger",
    "🦁" => "lion",
    "🐮" => "cow",
    "🐷" => "pig",
    "🐸" => "frog",
    "🐵" => "monkey_face",
    "🐔" => "chicken",
    "🐧" => "penguin",
    "🐦" => "bird",
    "🐝" => "bee",
    "🐛" => "bug",
    "🦋" => "butterfly",
    "🐌" => "snail",
    "🐢" => "turtle",
    "🐟" => "fish",
    "🐳" => "whale",
    "🐬" => "dolphin",
    "🦄" => "unicorn",
    "🐉" => "dragon",
    "✅" => "white_check_mark",
    "✔️" => "heavy_check_mark",
    "❌" => "x",
    "⚠️" => "warning",
    "⛔" => "no_entry",
    "🚫" => "no_entry_sign",
    "❓" => "question",
    "❗" => "exclamation",
    "❔" => "grey_question",
    "💯" => "100",
    "🔴" => "red_circle",
    "🔵" => "large_blue_circle",
    "⚪" => "white_circle",
    "⚫" => "black_circle",
    "🔄" => "arrows_counterclockwise",
    "➕" => "heavy_plus_sign",
    "➖" => "heavy_minus_sign",
    "♻️" => "recycle",
    "😔" => "pensive",
    "😌" => "relieved",
    "😪" => "sleepy",
    "😤" => "triumph",
    "😰" => "cold_sweat",
    "😮" => "open_mouth",
    "😯" => "hushed",
    "😵" => "dizzy_face",
    "😓" => "sweat",
    "😣" => "persevere",
    "😫" => "tired_face",
    "😩" => "weary",
    "😗" => "kissing",
    "😚" => "kissing_closed_eyes",
    "👿" => "imp",
    "😈" => "smiling_imp",
    "🌱" => "seedling",
    "🌿" => "herb",
    "🍀" => "four_leaf_clover",
    "🍁" => "maple_leaf",
    "🍂" => "fallen_leaf",
    "🍃" => "leaves",
    "🌵" => "cactus",
    "🌴" => "palm_tree",
    "🌲" => "evergreen_tree",
    "🌳" => "deciduous_tree",
    "🌸" => "cherry_blossom",
    "🌹" => "rose",
    "🌻" => "sunflower",
    "🌷" => "tulip",
    "🌼" => "blossom",
    "💐" => "bouquet",
    "🍄" => "mushroom",
    "🌍" => "earth_africa",
    "🌕" => "full_moon",
    "🌙" => "crescent_moon",
    "🚌" => "bus",
    "🚕" => "taxi",
    "🚚" => "truck",
    "🚢" => "ship",
    "⚓" => "anchor",
    "🚁" => "helicopter",
    "🚜" => "tractor",
    "🚓" => "police_car",
    "🚒" => "fire_engine",
    "🚑" => "ambulance",
    "📺" => "tv",
    "📻" => "radio",
    "🔋" => "battery",
    "🔌" => "electric_plug",
    "🔦" => "flashlight",
    "📰" => "newspaper",
    "🔖" => "bookmark",
    "💸" => "money_with_wings",
    "📋" => "clipboard",
    "📁" => "file_folder",
    "📂" => "open_file_folder",
    "📆" => "date",
    "📇" => "card_index",
    "📏" => "straight_ruler",
    "📐" => "triangular_ruler",
    "🔭" => "telescope",
    "🔬" => "microscope",
    "💉" => "syringe",
    "💊" => "pill",
    "🚪" => "door",
    "💣" => "bomb",
    "🔮" => "crystal_ball",
    "📡" => "satellite",
    "📣" => "mega",
    "📢" => "loudspeaker",
    "🔇" => "mute",
    "🔉" => "sound",
    "🔊" => "loud_sound",
    "🍞" => "bread",
    "🥚" => "egg",
    "🌮" => "taco",
    "🌯" => "burrito",
    "🍣" => "sushi",
    "🍜" => "ramen",
    "🍝" => "spaghetti",
    "🍛" => "curry",
    "🍱" => "bento",
    "🍚" => "rice",
    "🍨" => "ice_cream",
    "🍧" => "shaved_ice",
    "🍫" => "chocolate_bar",
    "🍭" => "lollipop",
    "🍯" => "honey_pot",
    "🍾" => "champagne",
    "🍶" => "sake",
    "🍈" => "melon",
    "🍒" => "cherries",
    "🍍" => "pineapple",
    "🍅" => "tomato",
    "🍆" => "eggplant",
    "🌽" => "corn",
    "🍠" => "sweet_potato",
};

/// Renderings whose variation-selector-stripped form is worth recognizing
/// even though the table keys carry the selector.
static STRIPPED_FALLBACK: phf::Map<&'static str, &'static str> = phf_map! {
    "❤" => "heart",
    "✔" => "heavy_check_mark",
    "✌" => "v",
    "☝" => "point_up",
    "✈" => "airplane",
    "☀" => "sunny",
    "☁" => "cloud",
    "❄" => "snowflake",
    "♻" => "recycle",
    "⚙" => "gear",
    "☎" => "telephone",
    "✉" => "envelope",
    "✂" => "scissors",
    "⚠" => "warning",
};

pub const UNKNOWN_EMOJI_NAME: &str = "question";

pub fn emoji_for_name(name: &str) -> Option<&'static str> {
    EMOJI_BY_NAME.get(name).copied()
}

fn strip_variation_selectors(emoji: &str) -> String {
    emoji
        .chars()
        .filter(|c| !matches!(c, '\u{fe0e}' | '\u{fe0f}'))
        .collect()
}

pub fn name_for_emoji(emoji: &str) -> Option<&'static str> {
    if let Some(name) = NAME_BY_EMOJI.get(emoji) {
        return Some(name);
    }
    let stripped = strip_variation_selectors(emoji);
    if let Some(name) = NAME_BY_EMOJI.get(stripped.as_str()) {
        return Some(name);
    }
    STRIPPED_FALLBACK.get(stripped.as_str()).copied()
}

/// Outbound: a Mattermost emoji name becomes its rendering, or falls
/// through as `:name:` so the text stays readable.
pub fn mm_emoji_to_matrix(name: &str) -> String {
    match emoji_for_name(name) {
        Some(emoji) => emoji.to_owned(),
        None => format!(":{name}:"),
    }
}

/// Inbound: a Matrix reaction key becomes a Mattermost emoji name, ending
/// at `question` when nothing matches.
pub fn matrix_emoji_to_mm(key: &str) -> String {
    name_for_emoji(key)
        .unwrap_or(UNKNOWN_EMOJI_NAME)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_names_roundtrip() {
        for name in ["smile", "+1", "tada", "rocket", "white_check_mark", "coffee"] {
            let emoji = emoji_for_name(name).unwrap();
            assert_eq!(name_for_emoji(emoji), Some(name), "name: {name}");
        }
    }

    #[test]
    fn reverse_table_is_inverse_of_forward_table() {
        for (emoji, name) in NAME_BY_EMOJI.entries() {
            assert_eq!(
                EMOJI_BY_NAME.get(name).copied(),
                Some(*emoji),
                "canonical pair broken for {name}"
            );
        }
    }

    #[test]
    fn aliases_resolve_to_canonical_reverse() {
        assert_eq!(mm_emoji_to_matrix("thumbsup"), "👍");
        assert_eq!(matrix_emoji_to_mm("👍"), "+1");
    }

    #[test]
    fn unknown_names_fall_through_as_colon_form() {
        assert_eq!(mm_emoji_to_matrix("totally_made_up"), ":totally_made_up:");
    }

    #[test]
    fn unknown_renderings_become_question() {
        assert_eq!(matrix_emoji_to_mm("🫨"), "question");
        assert_eq!(matrix_emoji_to_mm("not an emoji"), "question");
    }

    #[test]
    fn variation_selectors_are_tolerated() {
        // Bare heart, no VS16.
        assert_eq!(matrix_emoji_to_mm("❤"), "heart");
        // Fully qualified heart.
        assert_eq!(matrix_emoji_to_mm("❤️"), "heart");
        // A selector slapped onto a table entry that has none.
        assert_eq!(matrix_emoji_to_mm("⭐\u{fe0f}"), "star");
    }
}
