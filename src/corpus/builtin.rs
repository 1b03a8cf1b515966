//! Built-in reference corpus.

pub const HOOKS: &[&str] = &[
    "Most people get this backwards.",
    "I wasted three years before I learned this.",
    "Here's the uncomfortable truth about getting started.",
    "Stop doing this immediately.",
    "Nobody talks about this, but they should.",
    "The fastest way to get better at anything:",
    "If I had to start over, I'd do this first.",
    "This one habit changed everything for me.",
    "You don't need more time. You need this.",
    "The best advice I ever ignored:",
    "Most advice on this is wrong. Here's why.",
    "Want to know the real secret? It's boring.",
    "Read this before you make the same mistake.",
    "The gap between good and great is smaller than you think.",
    "Everyone wants the result. Few want the process.",
    "Simple isn't easy. Here's the difference.",
    "I asked 100 people the same question. Same answer.",
    "Do less. But do it better.",
    "The problem isn't effort. It's direction.",
    "Here's what nobody tells beginners.",
];

pub const EXAMPLES: &[&str] = &[
    "Motivation is a feeling.\nDiscipline is a decision.\nFeelings fade.\nDecisions compound.",
    "You don't rise to the level of your goals.\nYou fall to the level of your systems.\nBuild the system first.",
    "Your first version will be bad.\nShip it anyway.\nVersion ten is where the money is.",
    "The people who win are rarely the most talented.\nThey are the ones who stayed.",
    "Skills you learn once pay you forever.\nHabits you build once pay you daily.",
    "Stop asking how to get more time.\nStart asking what to stop doing.",
    "If you can't explain it simply,\nyou don't understand it well enough.\nSimplify until it hurts.",
    "Nobody cares about your first hundred attempts.\nThat's the best part.\nYou get to fail in private.",
    "The goal isn't to be busy.\nThe goal is to be effective.\nThose are rarely the same thing.",
    "Confidence comes from evidence.\nEvidence comes from reps.\nGo get reps.",
    "Most problems are solved by sleeping more,\nmoving more,\nand worrying less.",
    "You can't outwork a bad strategy.\nBut a good strategy makes work feel light.",
    "Consistency beats intensity.\nOne workout won't change you.\nOne hundred will.",
    "The market doesn't pay for effort.\nIt pays for outcomes.\nMeasure outcomes.",
    "Feedback is a gift.\nEven the kind you don't like.\nEspecially the kind you don't like.",
    "Every expert was once a beginner\nwho refused to quit.",
    "Be patient with results.\nBe impatient with actions.",
    "Clarity is a competitive advantage.\nMost people never write their goals down.",
    "Price is what you pay.\nValue is what they remember.",
    "Small wins, stacked daily,\nlook like overnight success\nfrom the outside.",
];
