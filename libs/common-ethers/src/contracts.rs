use ethers::contract::abigen;

abigen!(
    ITransparentUpgradeableProxy,
    r"[
        function upgradeTo(address newImplementation) external
        function upgradeToAndCall(address newImplementation, bytes calldata data) external payable
    ]"
);

abigen!(
    ProxyAdmin,
    r"[
        function upgrade(address proxy, address implementation) external
        function upgradeAndCall(address proxy, address implementation, bytes calldata data) external payable
    ]"
);
